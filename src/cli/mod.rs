//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod model_list;
pub mod pick_model;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::chat::{run_chat, ChatOptions};
use crate::cli::model_list::list_models;
use crate::core::config::Config;
use crate::core::models::ModelCatalog;

#[derive(Parser, Debug)]
#[command(name = "cliai")]
#[command(about = "Chat with AI models through a command-line interface")]
#[command(
    long_about = "cliai is a line-based terminal chat client for OpenAI, Anthropic and Google \
models. Replies stream as they arrive, conversations are kept per model, and a Markdown \
transcript is written when a chat ends.\n\n\
Environment Variables:\n\
  OPENAI_API_KEY      OpenAI API key\n\
  ANTHROPIC_API_KEY   Anthropic API key\n\
  GOOGLE_API_KEY      Google API key\n\
  CLIAI_LOG           Diagnostic filter (e.g. debug, cliai=trace); defaults to warn\n\n\
Keys may also live in a .env file in the working directory, or in the system keyring \
under service \"cliai\" with the provider id (openai, anthropic, google) as the user.\n\n\
Chat commands:\n\
  /exit, /quit      End the chat and save a Markdown transcript\n\
  /clear            Forget the conversation (the system prompt is kept)\n\
  /system           Replace the system prompt\n\
  /help             Show command help\n\
  Ctrl+C            Cancel a reply in progress, or end the chat at the prompt"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model id to chat with, or list available models if no model specified
    #[arg(
        short = 'm',
        long,
        global = true,
        value_name = "MODEL",
        num_args = 0..=1,
        default_missing_value = ""
    )]
    pub model: Option<String>,

    /// Initial system prompt
    #[arg(short = 's', long, global = true, value_name = "PROMPT")]
    pub system: Option<String>,

    /// Continue the previous conversation with this model instead of starting a new one
    #[arg(short = 'c', long = "continue", global = true)]
    pub continue_conversation: bool,

    /// Write diagnostics to a file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Start a chat session (default)
    Chat,
    /// List available models
    Models,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    crate::logging::init(args.log.as_deref())?;

    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let catalog = ModelCatalog::with_custom_models(&config.models)?;

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Models => {
            list_models(&catalog, config.default_model.as_deref())?;
            Ok(())
        }
        Commands::Chat => match args.model.as_deref() {
            // -m was provided without a value
            Some("") => {
                list_models(&catalog, config.default_model.as_deref())?;
                Ok(())
            }
            model => {
                let options = ChatOptions {
                    model: model.map(str::to_string),
                    system: args.system,
                    continue_conversation: args.continue_conversation,
                };
                run_chat(options, &config, &catalog).await
            }
        },
    }
}

#[cfg(test)]
mod tests;
