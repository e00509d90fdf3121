//! Uniform chat contract over the hosted providers.
//!
//! Every provider service implements [`ChatService`]: translate the
//! conversation into the provider's request shape, issue the call, and hand
//! back either a lazy [`TextStream`] of increments or the complete reply.
//! Services hold a live HTTP client until [`ChatService::close`] is called.

use std::error::Error;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::chat_stream::{api_error_message, TextStream};
use crate::core::message::Message;
use crate::core::models::Provider;

pub mod anthropic;
pub mod factory;
pub mod google;
pub mod openai;

pub use factory::service_for_model;

#[derive(Debug)]
pub enum ServiceError {
    /// No API key is configured for the provider. Raised while constructing
    /// the service, before any request is made.
    MissingCredential { provider: Provider },
    /// A provider tag outside the supported set.
    UnsupportedProvider(String),
    Http(reqwest::Error),
    /// The provider rejected the request or reported an error mid-stream.
    Api {
        status: Option<u16>,
        message: String,
    },
    /// The provider answered with something we could not decode.
    Decode(String),
    /// `generate` was called after `close`.
    Closed,
}

impl ServiceError {
    /// Credential and provider errors abort the whole command; everything
    /// else is contained to a single turn.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServiceError::MissingCredential { .. } | ServiceError::UnsupportedProvider(_)
        )
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::MissingCredential { provider } => write!(
                f,
                "Missing API key for {}. Please set {}.",
                provider.display_name(),
                provider.api_key_env_var()
            ),
            ServiceError::UnsupportedProvider(tag) => write!(f, "Unsupported provider: {tag}"),
            ServiceError::Http(err) => write!(f, "Request failed: {err}"),
            ServiceError::Api {
                status: Some(status),
                message,
            } => write!(f, "API error ({status}): {message}"),
            ServiceError::Api {
                status: None,
                message,
            } => write!(f, "API error: {message}"),
            ServiceError::Decode(detail) => write!(f, "Malformed response: {detail}"),
            ServiceError::Closed => write!(f, "Service has already been closed"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServiceError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Http(err)
    }
}

pub enum ServiceResponse {
    Stream(TextStream),
    Complete(String),
}

impl fmt::Debug for ServiceResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceResponse::Stream(_) => f.write_str("ServiceResponse::Stream(..)"),
            ServiceResponse::Complete(text) => {
                f.debug_tuple("ServiceResponse::Complete").field(text).finish()
            }
        }
    }
}

#[async_trait]
pub trait ChatService: Send + Sync {
    fn provider(&self) -> Provider;

    /// Generate a reply to `messages`. With `stream` the reply arrives as
    /// increments that the caller drains; without it the full text is
    /// returned. Network and API failures are returned as-is, without retry.
    async fn generate(
        &self,
        messages: &[Message],
        stream: bool,
    ) -> Result<ServiceResponse, ServiceError>;

    /// Release the HTTP client. Safe to call when no request was ever made.
    async fn close(&mut self);
}

pub(crate) fn require_api_key(
    credentials: &dyn crate::core::credentials::CredentialSource,
    provider: Provider,
) -> Result<String, ServiceError> {
    credentials
        .api_key(provider)
        .ok_or(ServiceError::MissingCredential { provider })
}

/// Join a base URL and an endpoint path without doubling slashes.
pub(crate) fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{base}/{endpoint}")
}

/// Send a JSON body and turn non-2xx responses into [`ServiceError::Api`].
pub(crate) async fn send_json<T: Serialize + ?Sized>(
    request: reqwest::RequestBuilder,
    body: &T,
) -> Result<reqwest::Response, ServiceError> {
    let response = request.json(body).send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(ServiceError::Api {
        status: Some(status.as_u16()),
        message: api_error_message(&body),
    })
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
) -> Result<T, ServiceError> {
    serde_json::from_value(value).map_err(|err| ServiceError::Decode(err.to_string()))
}

pub(crate) fn parse_payload(payload: &str) -> Result<serde_json::Value, ServiceError> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|_| ServiceError::Decode(api_error_message(payload)))?;
    if crate::core::chat_stream::is_error_payload(&value) {
        return Err(ServiceError::Api {
            status: None,
            message: api_error_message(payload),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_api_url_normalizes_slashes() {
        assert_eq!(
            construct_api_url("https://api.example.com/v1/", "/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            construct_api_url("https://api.example.com///", "models"),
            "https://api.example.com/models"
        );
    }

    #[test]
    fn missing_credential_names_provider_and_variable() {
        let err = ServiceError::MissingCredential {
            provider: Provider::Google,
        };
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Missing API key for Google. Please set GOOGLE_API_KEY."
        );
    }

    #[test]
    fn turn_level_errors_are_not_fatal() {
        let api = ServiceError::Api {
            status: Some(429),
            message: "slow down".to_string(),
        };
        assert!(!api.is_fatal());
        assert_eq!(api.to_string(), "API error (429): slow down");
        assert!(!ServiceError::Decode("x".into()).is_fatal());
    }

    #[test]
    fn parse_payload_separates_errors_from_frames() {
        assert!(parse_payload(r#"{"choices":[]}"#).is_ok());
        assert!(matches!(
            parse_payload(r#"{"error":{"message":"quota exceeded"}}"#),
            Err(ServiceError::Api { status: None, ref message }) if message == "quota exceeded"
        ));
        assert!(matches!(
            parse_payload("not json"),
            Err(ServiceError::Decode(_))
        ));
    }
}
