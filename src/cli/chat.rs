//! Line-based chat loop.

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::cli::pick_model::select_model;
use crate::core::config::{path_display, Config};
use crate::core::credentials::EnvCredentials;
use crate::core::history::HistoryStore;
use crate::core::message::Role;
use crate::core::models::ModelCatalog;
use crate::core::services::{service_for_model, ServiceError};
use crate::core::session::{ConversationSession, SessionOptions, TurnOutcome};

const HELP_TEXT: &str = "\
Commands:
  /exit or /quit   Exit the chat (saves the conversation as Markdown)
  /clear           Clear the conversation (the system prompt is kept)
  /system          Replace the system prompt
  /help            Show this help message

Tips:
  Use `cliai chat --continue` (or -c) to pick up the previous conversation.
  Ctrl+C cancels a reply that is still streaming.";

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub system: Option<String>,
    pub continue_conversation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Exit,
    Help,
    Clear,
    System,
    Unknown(String),
}

impl ChatCommand {
    /// Parse a `/command` line. Returns `None` for ordinary chat input.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if !trimmed.starts_with('/') {
            return None;
        }
        let command = trimmed.to_lowercase();
        Some(match command.as_str() {
            "/exit" | "/quit" => ChatCommand::Exit,
            "/help" => ChatCommand::Help,
            "/clear" => ChatCommand::Clear,
            "/system" => ChatCommand::System,
            _ => ChatCommand::Unknown(command),
        })
    }
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = io::stdout().flush();
}

/// Text printed before exiting on a credential or provider error.
fn fatal_report(err: &ServiceError) -> String {
    match err {
        ServiceError::MissingCredential { provider } => format!(
            "❌ Missing API key for {provider}\n\n\
             Please set the {} environment variable or add it to your .env file.\n\
             It can also be stored in the system keyring (service \"cliai\", user \"{}\").\n\
             You can get an API key from the {provider} website.",
            provider.api_key_env_var(),
            provider.id()
        ),
        other => format!("❌ {other}"),
    }
}

pub async fn run_chat(
    options: ChatOptions,
    config: &Config,
    catalog: &ModelCatalog,
) -> Result<(), Box<dyn Error>> {
    let model = select_model(options.model.as_deref(), config, catalog)?.clone();

    let credentials = EnvCredentials::new();
    let base_url = config.base_url_for(model.provider);
    let service = match service_for_model(&model, &credentials, base_url) {
        Ok(service) => service,
        Err(err) if err.is_fatal() => {
            eprintln!("{}", fatal_report(&err));
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    let history = HistoryStore::new(config.history_path()?);
    let mut session = ConversationSession::new(
        model,
        service,
        history,
        SessionOptions {
            new_conversation: !options.continue_conversation,
            system_prompt: config.system_prompt.clone(),
        },
    );
    if let Some(system) = options.system.filter(|s| !s.trim().is_empty()) {
        session.replace_system_prompt(system);
    }

    print_banner(&session, options.continue_conversation);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt("> ");
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match ChatCommand::parse(input) {
            Some(ChatCommand::Exit) => break,
            Some(ChatCommand::Help) => println!("{HELP_TEXT}\n"),
            Some(ChatCommand::Clear) => {
                session.clear();
                println!("Conversation cleared.\n");
            }
            Some(ChatCommand::System) => {
                prompt("Enter new system prompt: ");
                if let Some(new_prompt) = lines.next_line().await? {
                    let new_prompt = new_prompt.trim();
                    if !new_prompt.is_empty() {
                        session.replace_system_prompt(new_prompt);
                        println!("System prompt updated.\n");
                    }
                }
            }
            Some(ChatCommand::Unknown(command)) => eprintln!("Unknown command: {command}\n"),
            None => run_turn(&mut session, input).await,
        }
    }

    match session.close(config.export_dir.as_deref()).await {
        Ok(Some(path)) => println!("Chat saved to: {}", path_display(&path)),
        Ok(None) => {}
        Err(err) => eprintln!("⚠️  Could not write chat transcript: {err}"),
    }
    println!("Exiting chat.");
    Ok(())
}

fn print_banner(session: &ConversationSession, continuing: bool) {
    println!("Chat with {}", session.model().name);
    if continuing {
        println!("Continuing previous conversation.");
    }
    println!("Type '/help' for commands, or '/exit' to quit.");
    println!();

    let name = &session.model().name;
    for message in session.messages() {
        match message.role {
            Role::System => {}
            Role::User => println!("You: {}\n", message.content),
            Role::Assistant => println!("{name}: {}\n", message.content),
        }
    }
}

async fn run_turn(session: &mut ConversationSession, input: &str) {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    println!();
    prompt(&format!("{}: ", session.model().name));
    let mut printed = 0;
    let result = session
        .send(input, &cancel, |text| {
            // Partial replies only ever grow, so print the new tail.
            print!("{}", &text[printed..]);
            let _ = io::stdout().flush();
            printed = text.len();
        })
        .await;
    watcher.abort();

    match result {
        Ok(TurnOutcome::Completed {
            history_warning, ..
        }) => {
            println!("\n");
            if let Some(err) = history_warning {
                eprintln!("⚠️  Could not save conversation history: {err}\n");
            }
        }
        Ok(TurnOutcome::Cancelled { .. }) => println!("\n[reply cancelled]\n"),
        Err(err) => eprintln!("\n❌ Error: {err}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Provider;

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(ChatCommand::parse("/EXIT"), Some(ChatCommand::Exit));
        assert_eq!(ChatCommand::parse(" /quit "), Some(ChatCommand::Exit));
        assert_eq!(ChatCommand::parse("/Clear"), Some(ChatCommand::Clear));
        assert_eq!(ChatCommand::parse("/system"), Some(ChatCommand::System));
        assert_eq!(ChatCommand::parse("/help"), Some(ChatCommand::Help));
    }

    #[test]
    fn unknown_commands_are_reported_lowercased() {
        assert_eq!(
            ChatCommand::parse("/Frobnicate"),
            Some(ChatCommand::Unknown("/frobnicate".to_string()))
        );
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(ChatCommand::parse("what is /exit?"), None);
        assert_eq!(ChatCommand::parse("hello"), None);
    }

    #[test]
    fn missing_key_report_names_env_var_and_keyring_entry() {
        let report = fatal_report(&ServiceError::MissingCredential {
            provider: Provider::Anthropic,
        });

        assert!(report.starts_with("❌ Missing API key for Anthropic\n\n"));
        assert!(report.contains("Please set the ANTHROPIC_API_KEY environment variable"));
        assert!(report.contains("(service \"cliai\", user \"anthropic\")"));
    }

    #[test]
    fn unsupported_provider_is_fatal_and_reported() {
        let err = ServiceError::UnsupportedProvider("cohere".to_string());

        assert!(err.is_fatal());
        assert_eq!(fatal_report(&err), format!("❌ {err}"));
    }
}
