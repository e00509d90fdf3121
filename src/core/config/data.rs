use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::models::Provider;

/// A catalog entry declared in `config.toml`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CustomModel {
    pub id: String,
    pub name: Option<String>,
    /// Provider tag, resolved case-insensitively (`openai`, `Anthropic`, ...)
    pub provider: String,
    pub max_tokens: Option<u32>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Model id used when `--model` is not given
    pub default_model: Option<String>,
    /// Replaces the built-in default system prompt
    pub system_prompt: Option<String>,
    /// Overrides `<cache dir>/history.json`
    pub history_file: Option<PathBuf>,
    /// Directory for exported transcripts (defaults to the working directory)
    pub export_dir: Option<PathBuf>,
    /// API base URL overrides keyed by provider id (`openai`, `anthropic`, `google`)
    #[serde(default)]
    pub base_urls: HashMap<String, String>,
    #[serde(default)]
    pub models: Vec<CustomModel>,
}

impl Config {
    pub fn base_url_for(&self, provider: Provider) -> Option<&str> {
        self.base_urls
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(provider.id()))
            .map(|(_, url)| url.as_str())
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
