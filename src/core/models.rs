//! Provider tags and the model catalog.
//!
//! The built-in catalog is static. Config-defined models can extend or
//! override it (see [`ModelCatalog::with_custom_models`]).

use std::fmt;
use std::str::FromStr;

use crate::core::config::data::CustomModel;
use crate::core::services::ServiceError;

pub const DEFAULT_MODEL_ID: &str = "gpt-4o-2024-08-06";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAi, Provider::Anthropic, Provider::Google];

    /// Stable lowercase identifier used for config keys and keyring entries.
    pub fn id(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
        }
    }

    /// Human-facing name, also the value persisted in history records.
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::Anthropic => "Anthropic",
            Provider::Google => "Google",
        }
    }

    pub fn api_key_env_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Google => "GOOGLE_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Provider {
    type Err = ServiceError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let trimmed = tag.trim();
        Provider::ALL
            .into_iter()
            .find(|provider| {
                provider.id().eq_ignore_ascii_case(trimmed)
                    || provider.display_name().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| ServiceError::UnsupportedProvider(tag.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelIdentity {
    pub id: String,
    pub name: String,
    pub provider: Provider,
    pub max_output_tokens: u32,
    pub description: String,
}

impl ModelIdentity {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        provider: Provider,
        max_output_tokens: u32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provider,
            max_output_tokens,
            description: description.into(),
        }
    }
}

pub fn builtin_models() -> Vec<ModelIdentity> {
    vec![
        ModelIdentity::new(
            "gpt-4.5-preview-2025-02-27",
            "GPT-4.5 Preview",
            Provider::OpenAi,
            4096,
            "Most capable OpenAI model, preview version from Feb 2025",
        ),
        ModelIdentity::new(
            "gpt-4o-2024-08-06",
            "GPT-4o",
            Provider::OpenAi,
            4096,
            "Optimized version of GPT-4 from Aug 2024",
        ),
        ModelIdentity::new(
            "claude-3-7-sonnet-20250219",
            "Claude 3.7 Sonnet",
            Provider::Anthropic,
            4096,
            "Claude 3.7 Sonnet model from Feb 2025",
        ),
        ModelIdentity::new(
            "claude-3-5-sonnet-20241022",
            "Claude 3.5 Sonnet",
            Provider::Anthropic,
            4096,
            "Claude 3.5 Sonnet model from Oct 2024",
        ),
        ModelIdentity::new(
            "gemini-pro",
            "Gemini Pro",
            Provider::Google,
            4096,
            "Google's Gemini Pro language model",
        ),
    ]
}

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelIdentity>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            models: builtin_models(),
        }
    }
}

impl ModelCatalog {
    /// Extend the built-in catalog with config entries. An entry whose id
    /// matches an existing model replaces it in place.
    pub fn with_custom_models(custom: &[CustomModel]) -> Result<Self, ServiceError> {
        let mut catalog = Self::default();
        for entry in custom {
            let provider = entry.provider.parse::<Provider>()?;
            let model = ModelIdentity {
                id: entry.id.clone(),
                name: entry.name.clone().unwrap_or_else(|| entry.id.clone()),
                provider,
                max_output_tokens: entry.max_tokens.unwrap_or(4096),
                description: entry.description.clone().unwrap_or_default(),
            };
            match catalog.models.iter_mut().find(|m| m.id == model.id) {
                Some(existing) => *existing = model,
                None => catalog.models.push(model),
            }
        }
        Ok(catalog)
    }

    pub fn models(&self) -> &[ModelIdentity] {
        &self.models
    }

    pub fn find(&self, id: &str) -> Option<&ModelIdentity> {
        self.models.iter().find(|model| model.id == id)
    }

    /// The model named by `preferred` (or [`DEFAULT_MODEL_ID`]), falling back
    /// to the first catalog entry.
    pub fn default_model(&self, preferred: Option<&str>) -> Option<&ModelIdentity> {
        preferred
            .and_then(|id| self.find(id))
            .or_else(|| self.find(DEFAULT_MODEL_ID))
            .or_else(|| self.models.first())
    }
}
