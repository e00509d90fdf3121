//! Google Gemini `generateContent`.
//!
//! USER and ASSISTANT messages become chat history with roles `user` and
//! `model`. The first SYSTEM message is extracted but not transmitted: the
//! request carries no system instruction, so system-prompt support for Gemini
//! models is best-effort. This is a known gap.

use async_trait::async_trait;
use reqwest::Client;

use super::{
    construct_api_url, decode_json, parse_payload, require_api_key, send_json, ChatService,
    ServiceError, ServiceResponse,
};
use crate::api::google::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
};
use crate::core::chat_stream::{sse_text_stream, Frame};
use crate::core::credentials::CredentialSource;
use crate::core::message::{Message, Role};
use crate::core::models::{ModelIdentity, Provider};

pub const GOOGLE_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleConversation {
    /// Text of the first SYSTEM message, if any. Not sent.
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
}

pub struct GoogleService {
    client: Option<Client>,
    api_key: String,
    base_url: String,
    model_id: String,
    max_tokens: u32,
}

impl GoogleService {
    pub fn new(
        model: &ModelIdentity,
        credentials: &dyn CredentialSource,
        base_url: Option<&str>,
    ) -> Result<Self, ServiceError> {
        let api_key = require_api_key(credentials, Provider::Google)?;
        Ok(Self {
            client: Some(Client::new()),
            api_key,
            base_url: base_url.unwrap_or(GOOGLE_API_URL).to_string(),
            model_id: model.id.clone(),
            max_tokens: model.max_output_tokens,
        })
    }

    fn request(&self, conversation: GoogleConversation) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: conversation.contents,
            generation_config: GenerationConfig {
                max_output_tokens: self.max_tokens,
            },
        }
    }

    fn endpoint(&self, stream: bool) -> String {
        let method = if stream {
            "streamGenerateContent?alt=sse"
        } else {
            "generateContent"
        };
        construct_api_url(&self.base_url, &format!("models/{}:{method}", self.model_id))
    }
}

pub fn convert_messages(messages: &[Message]) -> GoogleConversation {
    let system_instruction = messages
        .iter()
        .find(|message| message.is_system())
        .map(|message| message.content.clone());

    let contents = messages
        .iter()
        .filter(|message| !message.is_system())
        .map(|message| Content {
            role: match message.role {
                Role::User => "user".to_string(),
                _ => "model".to_string(),
            },
            parts: vec![Part {
                text: message.content.clone(),
            }],
        })
        .collect();

    GoogleConversation {
        system_instruction,
        contents,
    }
}

pub(crate) fn decode_frame(payload: &str) -> Result<Frame, ServiceError> {
    let response: GenerateContentResponse = decode_json(parse_payload(payload)?)?;
    let text = response.text();
    if text.is_empty() {
        Ok(Frame::Skip)
    } else {
        Ok(Frame::Text(text))
    }
}

#[async_trait]
impl ChatService for GoogleService {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn generate(
        &self,
        messages: &[Message],
        stream: bool,
    ) -> Result<ServiceResponse, ServiceError> {
        let client = self.client.as_ref().ok_or(ServiceError::Closed)?;
        let conversation = convert_messages(messages);
        if let Some(system) = &conversation.system_instruction {
            tracing::debug!(
                provider = "google",
                system_len = system.len(),
                "System instruction extracted but not sent"
            );
        }
        let body = self.request(conversation);
        tracing::debug!(
            provider = "google",
            model_id = %self.model_id,
            content_count = body.contents.len(),
            stream,
            "Sending generateContent request"
        );

        let http_request = client
            .post(self.endpoint(stream))
            .header("x-goog-api-key", &self.api_key);
        let response = send_json(http_request, &body).await?;

        if stream {
            return Ok(ServiceResponse::Stream(sse_text_stream(
                response.bytes_stream(),
                decode_frame,
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| ServiceError::Decode(err.to_string()))?;
        Ok(ServiceResponse::Complete(parsed.text()))
    }

    async fn close(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!(provider = "google", "Closed HTTP client");
        }
    }
}
