//! API key lookup for providers.
//!
//! Keys come from the provider's environment variable (a `.env` file in the
//! working directory is merged in first), then from the system keyring entry
//! `cliai/<provider id>`. Blank values count as missing.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use keyring::Entry;

use crate::core::models::Provider;

const KEYRING_SERVICE: &str = "cliai";

pub trait CredentialSource: Send + Sync {
    fn api_key(&self, provider: Provider) -> Option<String>;
}

/// Failures when attempting to read the system keyring.
///
/// Recoverable errors mean the backend was temporarily unavailable (a locked
/// keychain, no secret service running). They are logged and treated as a
/// missing key.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Environment variables, then the system keyring.
#[derive(Debug, Clone)]
pub struct EnvCredentials;

impl EnvCredentials {
    /// Loads `.env` from the working directory (if any) into the process
    /// environment. Existing variables are not overridden.
    pub fn new() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self
    }

    fn keyring_key(provider: Provider) -> Result<Option<String>, KeyringAccessError> {
        let entry = Entry::new(KEYRING_SERVICE, provider.id())?;
        match entry.get_password() {
            Ok(token) => Ok(non_blank(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialSource for EnvCredentials {
    fn api_key(&self, provider: Provider) -> Option<String> {
        if let Some(key) = std::env::var(provider.api_key_env_var())
            .ok()
            .and_then(non_blank)
        {
            return Some(key);
        }

        match Self::keyring_key(provider) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(
                    provider = provider.id(),
                    recoverable = err.is_recoverable(),
                    error = %err,
                    "Keyring lookup failed"
                );
                None
            }
        }
    }
}

/// Fixed in-memory keys, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<Provider, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, provider: Provider, key: impl Into<String>) -> Self {
        self.keys.insert(provider, key.into());
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn api_key(&self, provider: Provider) -> Option<String> {
        self.keys.get(&provider).cloned().and_then(non_blank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_credentials_treat_blank_as_missing() {
        let creds = StaticCredentials::new()
            .with_key(Provider::OpenAi, "sk-test")
            .with_key(Provider::Anthropic, "   ");

        assert_eq!(creds.api_key(Provider::OpenAi).as_deref(), Some("sk-test"));
        assert_eq!(creds.api_key(Provider::Anthropic), None);
        assert_eq!(creds.api_key(Provider::Google), None);
    }
}
