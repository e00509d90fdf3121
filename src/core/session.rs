//! The live conversation with one model.
//!
//! [`ConversationSession`] owns the message list. Callers see it through
//! [`ConversationSession::messages`] and through the partial-reply callback
//! passed to [`ConversationSession::send`]; they never get a mutable handle.
//! Turns run strictly one at a time since `send` takes `&mut self`.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::core::export::write_transcript;
use crate::core::history::{HistoryError, HistoryStore};
use crate::core::message::Message;
use crate::core::models::ModelIdentity;
use crate::core::services::{ChatService, ServiceError, ServiceResponse};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Be concise but informative in your responses.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    AwaitingResponse,
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Ignore any stored conversation for the model.
    pub new_conversation: bool,
    /// Replaces [`DEFAULT_SYSTEM_PROMPT`] as the seeded SYSTEM message.
    pub system_prompt: Option<String>,
}

#[derive(Debug)]
pub enum TurnOutcome {
    Completed {
        reply: String,
        /// The reply is kept in memory even when persisting it failed.
        history_warning: Option<HistoryError>,
    },
    /// Interrupted before the reply finished. Nothing was appended or saved.
    Cancelled { partial: String },
}

#[derive(Debug)]
pub enum TurnError {
    Closed,
    Service(ServiceError),
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::Closed => write!(f, "Session is closed"),
            TurnError::Service(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TurnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TurnError::Closed => None,
            TurnError::Service(err) => Some(err),
        }
    }
}

impl From<ServiceError> for TurnError {
    fn from(err: ServiceError) -> Self {
        TurnError::Service(err)
    }
}

pub struct ConversationSession {
    model: ModelIdentity,
    service: Box<dyn ChatService>,
    history: HistoryStore,
    messages: Vec<Message>,
    state: SessionState,
}

impl ConversationSession {
    pub fn new(
        model: ModelIdentity,
        service: Box<dyn ChatService>,
        history: HistoryStore,
        options: SessionOptions,
    ) -> Self {
        let seed = options
            .system_prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        let mut messages = vec![Message::system(seed)];

        if !options.new_conversation {
            for message in history.load(&model.id) {
                // The first SYSTEM message wins; later ones are dropped.
                if message.is_system() && messages.iter().any(Message::is_system) {
                    continue;
                }
                messages.push(message);
            }
        }

        tracing::debug!(
            model_id = %model.id,
            provider = model.provider.id(),
            new_conversation = options.new_conversation,
            message_count = messages.len(),
            "Session initialized"
        );

        Self {
            model,
            service,
            history,
            messages,
            state: SessionState::Active,
        }
    }

    pub fn model(&self) -> &ModelIdentity {
        &self.model
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True once any USER or ASSISTANT message exists.
    pub fn has_conversation(&self) -> bool {
        self.messages.iter().any(|message| !message.is_system())
    }

    /// Run one turn. `on_update` receives the accumulated reply after every
    /// increment. Cancelling `cancel` abandons the request; the partial text
    /// is returned for display only.
    pub async fn send<F>(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
        mut on_update: F,
    ) -> Result<TurnOutcome, TurnError>
    where
        F: FnMut(&str),
    {
        if self.state == SessionState::Closed {
            return Err(TurnError::Closed);
        }

        self.messages.push(Message::user(text));
        self.state = SessionState::AwaitingResponse;

        let mut reply = String::new();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = collect_reply(
                self.service.as_ref(),
                &self.messages,
                &mut reply,
                &mut on_update,
            ) => Some(result),
        };
        self.state = SessionState::Active;

        match result {
            None => {
                tracing::info!(
                    model_id = %self.model.id,
                    partial_len = reply.len(),
                    "Turn cancelled"
                );
                Ok(TurnOutcome::Cancelled { partial: reply })
            }
            Some(Err(err)) => {
                tracing::warn!(model_id = %self.model.id, error = %err, "Turn failed");
                Err(TurnError::Service(err))
            }
            Some(Ok(())) => {
                self.messages.push(Message::assistant(reply.clone()));
                let history_warning = self.save().err();
                if let Some(err) = &history_warning {
                    tracing::warn!(error = %err, "Could not save conversation history");
                }
                Ok(TurnOutcome::Completed {
                    reply,
                    history_warning,
                })
            }
        }
    }

    fn save(&self) -> Result<(), HistoryError> {
        self.history.save(
            &self.model.id,
            &self.model.name,
            self.model.provider,
            &self.messages,
        )
    }

    /// Drop every SYSTEM message and put `prompt` first.
    pub fn replace_system_prompt(&mut self, prompt: impl Into<String>) {
        self.messages.retain(|message| !message.is_system());
        self.messages.insert(0, Message::system(prompt));
    }

    /// Keep only SYSTEM messages. Stored history changes on the next save.
    pub fn clear(&mut self) {
        self.messages.retain(Message::is_system);
    }

    /// Write the export (when there is anything to export) and release the
    /// service. Returns the export path. A second close does nothing.
    pub async fn close(&mut self, export_dir: Option<&Path>) -> io::Result<Option<PathBuf>> {
        if self.state == SessionState::Closed {
            return Ok(None);
        }

        let export = if self.has_conversation() {
            Some(write_transcript(&self.model, &self.messages, export_dir))
        } else {
            None
        };

        self.service.close().await;
        self.state = SessionState::Closed;
        tracing::debug!(model_id = %self.model.id, "Session closed");

        export.transpose()
    }
}

async fn collect_reply<F>(
    service: &dyn ChatService,
    messages: &[Message],
    reply: &mut String,
    on_update: &mut F,
) -> Result<(), ServiceError>
where
    F: FnMut(&str),
{
    match service.generate(messages, true).await? {
        ServiceResponse::Complete(text) => {
            reply.push_str(&text);
            on_update(reply.as_str());
        }
        ServiceResponse::Stream(mut increments) => {
            while let Some(increment) = increments.next().await {
                reply.push_str(&increment?);
                on_update(reply.as_str());
            }
        }
    }
    Ok(())
}
