use log::{ error, info, warn };
use std::error::Error;
use std::future::Future;
use std::io::Write;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, BufReader, Lines };

use crate::agent::AIAgent;
use crate::cli::Args;
use crate::models::chat::Conversation;

fn print_fragment(fragment: &str) {
    print!("{}", fragment);
    let _ = std::io::stdout().flush();
}

/// Next input line, or `None` at end of input or when `interrupt` completes first.
async fn next_input<R, I>(lines: &mut Lines<R>, interrupt: I) -> std::io::Result<Option<String>>
    where R: AsyncBufRead + Unpin, I: Future
{
    tokio::select! {
        line = lines.next_line() => line,
        _ = interrupt => Ok(None),
    }
}

/// Terminal conversation. Replies are printed fragment by fragment; Ctrl-C
/// abandons the reply in progress and closes its upstream stream.
pub async fn run_chat(agent: &mut AIAgent, args: &Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut conversation = Conversation::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Conversation {} started", conversation.id);
    println!("Type a message, /retry to resend the last one, /exit to quit.");

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        // Once a reply has listened for Ctrl-C the default SIGINT handler is gone,
        // so the prompt has to watch for it too.
        let Some(line) = next_input(&mut lines, tokio::signal::ctrl_c()).await? else {
            println!();
            break;
        };
        let line = line.trim().to_string();

        let outcome = match line.as_str() {
            "" => {
                continue;
            }
            "/exit" | "/quit" => {
                break;
            }
            "/retry" => {
                tokio::select! {
                    res = conversation.retry_last(agent, print_fragment) => Some(res),
                    _ = tokio::signal::ctrl_c() => None,
                }
            }
            prompt => {
                match agent.reload_prompts_if_changed(args) {
                    Ok(true) => info!("Prompt configuration reloaded"),
                    Ok(false) => {}
                    Err(e) => error!("Failed to reload prompts: {}", e),
                }
                tokio::select! {
                    res = conversation.send(agent, prompt, print_fragment) => Some(res),
                    _ = tokio::signal::ctrl_c() => None,
                }
            }
        };
        println!();

        match outcome {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!("Reply failed: {}", e);
                println!("{}", agent.prompts().error_message);
            }
            None => warn!("Reply abandoned by user"),
        }
    }

    info!("Conversation {} ended after {} turn(s)", conversation.id, conversation.turns().len());
    Ok(())
}
