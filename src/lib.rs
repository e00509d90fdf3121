//! cliai is a terminal chat client for hosted LLM providers.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the message model, the provider services that normalize
//!   OpenAI, Anthropic and Google into one streaming contract, the per-model
//!   history store, and the conversation session that ties them together.
//! - [`api`] defines the provider-specific request and response payloads.
//! - [`cli`] parses arguments and runs the line-based chat loop.
//! - [`logging`] wires `tracing` output to stderr or a log file.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
