use crate::core::credentials::CredentialSource;
use crate::core::models::{ModelIdentity, Provider};

use super::anthropic::AnthropicService;
use super::google::GoogleService;
use super::openai::OpenAiService;
use super::{ChatService, ServiceError};

/// Build a fresh service for `model`. Services are never cached; each call
/// constructs a new client, and fails early if the provider's key is missing.
pub fn service_for_model(
    model: &ModelIdentity,
    credentials: &dyn CredentialSource,
    base_url: Option<&str>,
) -> Result<Box<dyn ChatService>, ServiceError> {
    tracing::debug!(
        model_id = %model.id,
        provider = model.provider.id(),
        "Creating chat service"
    );
    let service: Box<dyn ChatService> = match model.provider {
        Provider::OpenAi => Box::new(OpenAiService::new(model, credentials, base_url)?),
        Provider::Anthropic => Box::new(AnthropicService::new(model, credentials, base_url)?),
        Provider::Google => Box::new(GoogleService::new(model, credentials, base_url)?),
    };
    Ok(service)
}
