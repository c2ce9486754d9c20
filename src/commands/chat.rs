use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::chat::stream::ChatClient;
use crate::chat::{ChatSession, SubmitRejected, TokenUsage, Transition, TurnId};
use crate::config::AppSettings;

fn new_session(settings: &AppSettings) -> ChatSession {
    ChatSession::new(ChatClient::new(settings.endpoints(), settings.top_k))
}

/// Interactive loop: one question per line, `/clear` to start over.
pub async fn chat(settings: &AppSettings) -> Result<(), String> {
    let mut session = new_session(settings);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Ask a question about the knowledge base. /clear to reset, /quit to leave.");
    loop {
        print!("> ");
        std::io::stdout().flush().map_err(|e| e.to_string())?;

        let line = tokio::select! {
            line = lines.next_line() => line.map_err(|e| e.to_string())?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        match session.submit(&line) {
            Ok(submission) => {
                if !stream_answer(&mut session, submission.assistant_turn).await {
                    break;
                }
            }
            Err(SubmitRejected::Blank) => continue,
            Err(e) => println!("{}", e),
        }
    }

    // dropping the session closes any open stream
    Ok(())
}

/// One-shot question.
pub async fn ask(settings: &AppSettings, question: &str) -> Result<(), String> {
    let mut session = new_session(settings);
    let submission = session.submit(question).map_err(|e| e.to_string())?;
    stream_answer(&mut session, submission.assistant_turn).await;

    match session.state().turn(submission.assistant_turn) {
        Some(answer) if answer.error_message.is_some() => {
            Err(answer.error_message.clone().unwrap_or_default())
        }
        Some(_) => Ok(()),
        None => Err("Answer was discarded".into()),
    }
}

/// Prints deltas until the turn terminates. Returns `false` when interrupted.
async fn stream_answer(session: &mut ChatSession, turn: TurnId) -> bool {
    let mut stdout = std::io::stdout();
    loop {
        let transition = tokio::select! {
            t = session.next_transition() => t,
            _ = tokio::signal::ctrl_c() => {
                println!();
                return false;
            }
        };
        let Some(transition) = transition else {
            return true;
        };

        match transition {
            Transition::Appended { delta, .. } => {
                print!("{}", delta);
                let _ = stdout.flush();
            }
            Transition::Finished { delta, .. } => {
                println!("{}", delta);
                if let Some(usage) = session.state().turn(turn).and_then(|t| t.usage) {
                    println!("{}", format_usage(&usage));
                }
                return true;
            }
            Transition::Failed { message, .. } => {
                println!();
                println!("Error: {}", message);
                return true;
            }
            Transition::Ignored => {}
        }
    }
}

fn format_usage(usage: &TokenUsage) -> String {
    format!(
        "Tokens: input {} | output {} | total {}",
        usage.input_tokens, usage.output_tokens, usage.total_tokens
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_usage() {
        let usage = TokenUsage {
            input_tokens: 5,
            output_tokens: 4,
            total_tokens: 9,
        };
        assert_eq!(format_usage(&usage), "Tokens: input 5 | output 4 | total 9");
    }
}
