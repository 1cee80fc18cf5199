use log::info;
use serde::{ Deserialize, Serialize };
use serde_json::json;

use super::parse_json_output;
use crate::agent::AIAgent;
use crate::config::prompt::get_diagnosis_prompt;
use crate::llm::chat::GenerateRequest;
use crate::llm::media::DataUri;
use crate::llm::{ ChatError, GenerationConfig };

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnoseExamInput {
    /// `data:<mime>;base64,<payload>`; may carry the user's red annotations.
    pub exam_photo_data_uri: Option<String>,
    pub symptoms: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnoseExamOutput {
    pub analysis: String,
    pub disclaimer: String,
}

fn output_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "analysis": { "type": "STRING" },
            "disclaimer": { "type": "STRING" }
        },
        "required": ["analysis", "disclaimer"]
    })
}

pub async fn diagnose_exam(agent: &AIAgent, input: &DiagnoseExamInput) -> Result<DiagnoseExamOutput, ChatError> {
    if input.symptoms.trim().is_empty() {
        return Err(ChatError::InvalidInput("symptoms description is required".into()));
    }
    let photo = input.exam_photo_data_uri
        .as_deref()
        .filter(|uri| !uri.trim().is_empty())
        .map(DataUri::parse)
        .transpose()?;

    let prompts = agent.prompts();
    let mut request = GenerateRequest::text(
        get_diagnosis_prompt(prompts, &input.symptoms, photo.is_some())
    ).with_config(
        GenerationConfig {
            safety_settings: prompts.diagnosis_safety_settings.clone(),
            ..Default::default()
        }.json_output(output_schema())
    );
    if let Some(photo) = photo {
        info!("Diagnosis request carries a {} image", photo.mime_type);
        request = request.with_media(photo);
    }

    let resp = agent.chat_client().generate(&request).await?;
    let output: DiagnoseExamOutput = parse_json_output("diagnosis", &resp.text)?;
    if output.analysis.trim().is_empty() {
        return Err(ChatError::NoOutput("diagnosis returned an empty analysis".into()));
    }
    Ok(output)
}
