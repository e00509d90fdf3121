//! OpenAI Chat Completions.
//!
//! Messages pass through unchanged, system message included.

use async_trait::async_trait;
use reqwest::Client;

use super::{
    construct_api_url, decode_json, parse_payload, require_api_key, send_json, ChatService,
    ServiceError, ServiceResponse,
};
use crate::api::openai::{ChatCompletion, ChatMessage, ChatRequest, ChatResponse};
use crate::core::chat_stream::{sse_text_stream, Frame};
use crate::core::credentials::CredentialSource;
use crate::core::message::Message;
use crate::core::models::{ModelIdentity, Provider};

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiService {
    client: Option<Client>,
    api_key: String,
    base_url: String,
    model_id: String,
}

impl OpenAiService {
    pub fn new(
        model: &ModelIdentity,
        credentials: &dyn CredentialSource,
        base_url: Option<&str>,
    ) -> Result<Self, ServiceError> {
        let api_key = require_api_key(credentials, Provider::OpenAi)?;
        Ok(Self {
            client: Some(Client::new()),
            api_key,
            base_url: base_url.unwrap_or(OPENAI_API_URL).to_string(),
            model_id: model.id.clone(),
        })
    }

    fn request(&self, stream: bool, messages: &[Message]) -> ChatRequest {
        ChatRequest {
            model: self.model_id.clone(),
            messages: convert_messages(messages),
            stream,
        }
    }
}

pub fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|message| ChatMessage {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        })
        .collect()
}

pub(crate) fn decode_frame(payload: &str) -> Result<Frame, ServiceError> {
    if payload == "[DONE]" {
        return Ok(Frame::Done);
    }

    let chunk: ChatResponse = decode_json(parse_payload(payload)?)?;
    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();

    if text.is_empty() {
        Ok(Frame::Skip)
    } else {
        Ok(Frame::Text(text))
    }
}

#[async_trait]
impl ChatService for OpenAiService {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate(
        &self,
        messages: &[Message],
        stream: bool,
    ) -> Result<ServiceResponse, ServiceError> {
        let client = self.client.as_ref().ok_or(ServiceError::Closed)?;
        let body = self.request(stream, messages);
        tracing::debug!(
            provider = "openai",
            model_id = %self.model_id,
            message_count = body.messages.len(),
            stream,
            "Sending chat completion request"
        );

        let http_request = client
            .post(construct_api_url(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key);
        let response = send_json(http_request, &body).await?;

        if stream {
            return Ok(ServiceResponse::Stream(sse_text_stream(
                response.bytes_stream(),
                decode_frame,
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|err| ServiceError::Decode(err.to_string()))?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(ServiceResponse::Complete(text))
    }

    async fn close(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!(provider = "openai", "Closed HTTP client");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credentials::StaticCredentials;
    use crate::core::message::Role;

    fn model() -> ModelIdentity {
        ModelIdentity::new("gpt-4o-2024-08-06", "GPT-4o", Provider::OpenAi, 4096, "")
    }

    fn keyed() -> StaticCredentials {
        StaticCredentials::new().with_key(Provider::OpenAi, "k")
    }

    #[test]
    fn conversion_preserves_count_order_and_roles() {
        let messages = vec![
            Message::system("Be terse."),
            Message::user("2+2?"),
            Message::assistant("4."),
            Message::user("and 3+3?"),
        ];

        let converted = convert_messages(&messages);

        assert_eq!(converted.len(), messages.len());
        for (original, wire) in messages.iter().zip(&converted) {
            assert_eq!(wire.role, original.role.as_str());
            assert_eq!(wire.content, original.content);
        }
        assert_eq!(converted[0].role, "system");
    }

    #[test]
    fn request_serializes_stream_flag() {
        let service = OpenAiService::new(&model(), &keyed(), None).unwrap();
        let body = serde_json::to_value(service.request(true, &[Message::user("Hi")])).unwrap();
        assert_eq!(body["model"], "gpt-4o-2024-08-06");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], Role::User.as_str());
    }

    #[test]
    fn decode_frame_extracts_delta_text() {
        let frame = decode_frame(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#).unwrap();
        assert_eq!(frame, Frame::Text("Hel".to_string()));
    }

    #[test]
    fn decode_frame_skips_role_tool_and_empty_deltas() {
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        let tool_call = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1"}]}}]}"#;
        let empty = r#"{"choices":[{"delta":{"content":""},"finish_reason":"stop"}]}"#;
        let no_choices = r#"{"choices":[],"usage":{"total_tokens":12}}"#;

        for payload in [role_only, tool_call, empty, no_choices] {
            assert_eq!(decode_frame(payload).unwrap(), Frame::Skip, "{payload}");
        }
        assert_eq!(decode_frame("[DONE]").unwrap(), Frame::Done);
    }

    #[test]
    fn decode_frame_surfaces_stream_errors() {
        let err = decode_frame(r#"{"error":{"message":"internal server error"}}"#).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Api { ref message, .. } if message == "internal server error"
        ));
    }

    #[test]
    fn missing_key_fails_at_construction() {
        let err = OpenAiService::new(&model(), &StaticCredentials::new(), None)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ServiceError::MissingCredential {
                provider: Provider::OpenAi
            }
        ));
    }

    #[tokio::test]
    async fn generate_after_close_is_rejected() {
        let mut service = OpenAiService::new(&model(), &keyed(), None).unwrap();
        service.close().await;
        service.close().await;

        let err = service.generate(&[Message::user("Hi")], true).await.unwrap_err();
        assert!(matches!(err, ServiceError::Closed));
    }
}
