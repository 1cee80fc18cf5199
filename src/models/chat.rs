use chrono::Utc;
use log::{ debug, warn };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use crate::agent::AIAgent;
use crate::llm::ChatError;
use crate::relay::{ relay_prompt, PromptRequest };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
    /// Set on the synthetic assistant turn appended after a failed reply.
    #[serde(default)]
    pub is_error: bool,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now().timestamp(),
            is_error: false,
        }
    }
}

/// Client-side conversation log.
///
/// Turns are only ever appended. The assistant turn being streamed grows as
/// fragments arrive and is left untouched once its stream has ended, whether
/// it completed or failed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    turns: Vec<ConversationTurn>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4().to_string(), turns: Vec::new() }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn is_first_message(&self) -> bool {
        !self.turns.iter().any(|t| t.role == Role::User)
    }

    /// Sends `prompt`, feeding each fragment to `on_fragment` as it arrives.
    /// Returns the complete reply.
    pub async fn send<F>(&mut self, agent: &AIAgent, prompt: &str, on_fragment: F) -> Result<String, ChatError>
        where F: FnMut(&str)
    {
        if prompt.trim().is_empty() {
            return Err(ChatError::EmptyPrompt);
        }
        let request = PromptRequest::new(prompt, self.is_first_message());
        self.turns.push(ConversationTurn::new(Role::User, prompt));
        self.stream_reply(agent, &request, on_fragment).await
    }

    /// Issues the most recent user prompt again, from scratch, as a new reply.
    pub async fn retry_last<F>(&mut self, agent: &AIAgent, on_fragment: F) -> Result<String, ChatError>
        where F: FnMut(&str)
    {
        let (index, prompt) = self.turns
            .iter()
            .enumerate()
            .rev()
            .find(|(_, t)| t.role == Role::User)
            .map(|(i, t)| (i, t.content.clone()))
            .ok_or_else(|| ChatError::InvalidInput("there is no prompt to retry".into()))?;
        let is_first = !self.turns[..index].iter().any(|t| t.role == Role::User);

        self.stream_reply(agent, &PromptRequest::new(prompt, is_first), on_fragment).await
    }

    async fn stream_reply<F>(
        &mut self,
        agent: &AIAgent,
        request: &PromptRequest,
        mut on_fragment: F
    ) -> Result<String, ChatError>
        where F: FnMut(&str)
    {
        let mut stream = match relay_prompt(agent, request).await {
            Ok(stream) => stream,
            Err(e) => {
                self.push_error(agent);
                return Err(e);
            }
        };

        let reply = self.turns.len();
        self.turns.push(ConversationTurn::new(Role::Assistant, ""));
        let mut fragments = 0usize;

        while let Some(fragment) = stream.next_fragment().await {
            match fragment {
                Ok(text) => {
                    fragments += 1;
                    on_fragment(&text);
                    self.turns[reply].content.push_str(&text);
                }
                Err(e) => {
                    warn!("Conversation {}: reply failed after {} fragment(s): {}", self.id, fragments, e);
                    self.push_error(agent);
                    return Err(e);
                }
            }
        }

        debug!("Conversation {}: reply complete in {} fragment(s)", self.id, fragments);
        Ok(self.turns[reply].content.clone())
    }

    fn push_error(&mut self, agent: &AIAgent) {
        let mut turn = ConversationTurn::new(Role::Assistant, agent.prompts().error_message.clone());
        turn.is_error = true;
        self.turns.push(turn);
    }
}
