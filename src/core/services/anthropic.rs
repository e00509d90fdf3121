//! Anthropic Messages API.
//!
//! The Messages array has no system role. SYSTEM messages are downgraded to
//! USER messages in place (same position, same content) rather than moved
//! into the top-level `system` parameter.

use async_trait::async_trait;
use reqwest::Client;

use super::{
    construct_api_url, decode_json, parse_payload, require_api_key, send_json, ChatService,
    ServiceError, ServiceResponse,
};
use crate::api::anthropic::{
    AnthropicMessage, BlockDelta, ContentBlock, MessagesRequest, MessagesResponse, StreamEvent,
    ANTHROPIC_VERSION,
};
use crate::core::chat_stream::{sse_text_stream, Frame};
use crate::core::credentials::CredentialSource;
use crate::core::message::{Message, Role};
use crate::core::models::{ModelIdentity, Provider};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";

pub struct AnthropicService {
    client: Option<Client>,
    api_key: String,
    base_url: String,
    model_id: String,
    max_tokens: u32,
}

impl AnthropicService {
    pub fn new(
        model: &ModelIdentity,
        credentials: &dyn CredentialSource,
        base_url: Option<&str>,
    ) -> Result<Self, ServiceError> {
        let api_key = require_api_key(credentials, Provider::Anthropic)?;
        Ok(Self {
            client: Some(Client::new()),
            api_key,
            base_url: base_url.unwrap_or(ANTHROPIC_API_URL).to_string(),
            model_id: model.id.clone(),
            max_tokens: model.max_output_tokens,
        })
    }

    fn request(&self, stream: bool, messages: &[Message]) -> MessagesRequest {
        MessagesRequest {
            model: self.model_id.clone(),
            messages: convert_messages(messages),
            max_tokens: self.max_tokens,
            stream,
        }
    }
}

pub fn convert_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
    messages
        .iter()
        .map(|message| {
            let role = match message.role {
                Role::System | Role::User => Role::User,
                Role::Assistant => Role::Assistant,
            };
            AnthropicMessage {
                role: role.as_str().to_string(),
                content: message.content.clone(),
            }
        })
        .collect()
}

pub(crate) fn decode_frame(payload: &str) -> Result<Frame, ServiceError> {
    let event: StreamEvent = decode_json(parse_payload(payload)?)?;
    match event {
        StreamEvent::ContentBlockDelta {
            delta: BlockDelta::TextDelta { text },
        } if !text.is_empty() => Ok(Frame::Text(text)),
        StreamEvent::MessageStop => Ok(Frame::Done),
        _ => Ok(Frame::Skip),
    }
}

fn response_text(response: MessagesResponse) -> String {
    response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect()
}

#[async_trait]
impl ChatService for AnthropicService {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate(
        &self,
        messages: &[Message],
        stream: bool,
    ) -> Result<ServiceResponse, ServiceError> {
        let client = self.client.as_ref().ok_or(ServiceError::Closed)?;
        let body = self.request(stream, messages);
        tracing::debug!(
            provider = "anthropic",
            model_id = %self.model_id,
            message_count = body.messages.len(),
            max_tokens = body.max_tokens,
            stream,
            "Sending messages request"
        );

        let http_request = client
            .post(construct_api_url(&self.base_url, "v1/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let response = send_json(http_request, &body).await?;

        if stream {
            return Ok(ServiceResponse::Stream(sse_text_stream(
                response.bytes_stream(),
                decode_frame,
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|err| ServiceError::Decode(err.to_string()))?;
        Ok(ServiceResponse::Complete(response_text(parsed)))
    }

    async fn close(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!(provider = "anthropic", "Closed HTTP client");
        }
    }
}
