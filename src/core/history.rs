//! Per-model conversation history.
//!
//! The store is one JSON array of conversation records, read fully on every
//! load and rewritten fully on every save. Records are keyed by model id;
//! saving replaces that record's messages and leaves other records as found.
//!
//! There is no locking. Two processes saving at once can lose one of the
//! updates. Each write goes through a temp file and rename, so a crash never
//! leaves a torn file behind.

use std::error::Error;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::core::config::path_display;
use crate::core::message::{decode_lenient, Message};
use crate::core::models::Provider;

#[derive(Debug)]
pub enum HistoryError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialize(serde_json::Error),
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
    },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::Io { path, source } => {
                write!(f, "Could not write history at {}: {}", path_display(path), source)
            }
            HistoryError::Serialize(err) => write!(f, "Could not serialize history: {err}"),
            HistoryError::Persist { path, source } => {
                write!(f, "Could not replace history at {}: {}", path_display(path), source)
            }
        }
    }
}

impl Error for HistoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HistoryError::Io { source, .. } => Some(source),
            HistoryError::Serialize(err) => Some(err),
            HistoryError::Persist { source, .. } => Some(source),
        }
    }
}

/// A record as first written. Existing records are edited as raw JSON so
/// fields we do not model survive a rewrite.
#[derive(Debug, Serialize)]
struct NewRecord<'a> {
    model_id: &'a str,
    model_name: &'a str,
    provider: &'a str,
    messages: &'a [Message],
    created: &'a str,
    last_updated: &'a str,
}

const LAST_UPDATED_KEY: &str = "last_updated";
const LAST_UPDATED_ALIAS: &str = "lastUpdatedAt";

fn timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn record_model_id(value: &Value) -> Option<&str> {
    value
        .get("model_id")
        .or_else(|| value.get("modelId"))
        .and_then(Value::as_str)
}

/// Metadata fields are never inspected, so a record with a mistyped name or
/// timestamp still yields its messages.
fn record_messages(record: &Value) -> Vec<Message> {
    record
        .get("messages")
        .and_then(Value::as_array)
        .map(|values| decode_lenient(values))
        .unwrap_or_default()
}

/// Replace the messages of an existing record and bump its timestamp under
/// whichever key spelling the record already uses.
fn update_record(record: &mut Map<String, Value>, messages: Value, now: String) {
    record.insert("messages".to_string(), messages);
    let camel_case = !record.contains_key(LAST_UPDATED_KEY);
    let key = if camel_case && record.contains_key(LAST_UPDATED_ALIAS) {
        LAST_UPDATED_ALIAS
    } else {
        record.remove(LAST_UPDATED_ALIAS);
        LAST_UPDATED_KEY
    };
    record.insert(key.to_string(), Value::String(now));
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole collection. Anything unreadable (missing file, I/O
    /// error, invalid JSON, non-array root) reads as empty.
    fn read_all(&self) -> Vec<Value> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                tracing::warn!(
                    path = %path_display(&self.path),
                    error = %err,
                    "History unreadable"
                );
                return Vec::new();
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Array(records)) => records,
            Ok(_) => {
                tracing::warn!(path = %path_display(&self.path), "History root is not an array");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(
                    path = %path_display(&self.path),
                    error = %err,
                    "History is not valid JSON"
                );
                Vec::new()
            }
        }
    }

    /// Messages of the record for `model_id`, in stored order, minus any that
    /// fail to decode. Never fails; a fresh conversation reads as empty.
    pub fn load(&self, model_id: &str) -> Vec<Message> {
        let records = self.read_all();
        let Some(raw) = records
            .iter()
            .find(|record| record_model_id(record) == Some(model_id))
        else {
            return Vec::new();
        };

        let messages = record_messages(raw);
        let stored = raw
            .get("messages")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        tracing::debug!(
            model_id,
            loaded = messages.len(),
            skipped = stored - messages.len(),
            "Loaded conversation history"
        );
        messages
    }

    /// Upsert the record for `model_id`: replace its messages and bump the
    /// last-updated time, or append a new record. Other records are untouched.
    pub fn save(
        &self,
        model_id: &str,
        model_name: &str,
        provider: Provider,
        messages: &[Message],
    ) -> Result<(), HistoryError> {
        let mut records = self.read_all();
        let now = timestamp();

        let existing = records
            .iter_mut()
            .find(|record| record_model_id(record) == Some(model_id))
            .and_then(Value::as_object_mut);

        match existing {
            Some(record) => {
                let serialized =
                    serde_json::to_value(messages).map_err(HistoryError::Serialize)?;
                update_record(record, serialized, now);
            }
            None => {
                let record = NewRecord {
                    model_id,
                    model_name,
                    provider: provider.display_name(),
                    messages,
                    created: &now,
                    last_updated: &now,
                };
                records.push(serde_json::to_value(record).map_err(HistoryError::Serialize)?);
            }
        }

        self.write_all(&records)?;
        tracing::debug!(
            model_id,
            message_count = messages.len(),
            path = %path_display(&self.path),
            "Saved conversation history"
        );
        Ok(())
    }

    fn write_all(&self, records: &[Value]) -> Result<(), HistoryError> {
        let io_err = |source: std::io::Error| HistoryError::Io {
            path: self.path.clone(),
            source,
        };
        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(io_err)?;
        }

        let contents = serde_json::to_string_pretty(records).map_err(HistoryError::Serialize)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new_in("."),
        }
        .map_err(io_err)?;

        temp_file.write_all(contents.as_bytes()).map_err(io_err)?;
        temp_file.as_file_mut().sync_all().map_err(io_err)?;
        temp_file
            .persist(&self.path)
            .map_err(|source| HistoryError::Persist {
                path: self.path.clone(),
                source,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> HistoryStore {
        HistoryStore::new(dir.path().join("cliai").join("history.json"))
    }

    fn written(store: &HistoryStore) -> Vec<Value> {
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap()
    }

    fn seed(store: &HistoryStore, raw: Value) {
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), raw.to_string()).unwrap();
    }

    fn sample() -> Vec<Message> {
        vec![
            Message::system("You are helpful."),
            Message::user("Hi"),
            Message::assistant("Hello!"),
        ]
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).load("gpt-4o-2024-08-06").is_empty());
    }

    #[test]
    fn save_then_load_round_trips_in_order() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store
            .save("gpt-4o-2024-08-06", "GPT-4o", Provider::OpenAi, &sample())
            .unwrap();

        assert_eq!(store.load("gpt-4o-2024-08-06"), sample());
    }

    #[test]
    fn saves_for_different_models_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let other = vec![Message::user("Bonjour")];

        store.save("model-a", "A", Provider::OpenAi, &sample()).unwrap();
        store.save("model-b", "B", Provider::Google, &other).unwrap();

        assert_eq!(store.load("model-a"), sample());
        assert_eq!(store.load("model-b"), other);
        assert_eq!(written(&store).len(), 2);
    }

    #[test]
    fn resaving_replaces_messages_and_keeps_created() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.save("model-a", "A", Provider::Anthropic, &sample()).unwrap();
        let created = written(&store)[0]["created"].clone();

        let shorter = vec![Message::user("only this")];
        store.save("model-a", "A", Provider::Anthropic, &shorter).unwrap();

        let records = written(&store);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["created"], created);
        assert_eq!(records[0]["provider"], "Anthropic");
        assert_eq!(store.load("model-a"), shorter);
    }

    #[test]
    fn unknown_roles_are_skipped_individually() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        let raw = json!([{
            "model_id": "claude-3-5-sonnet-20241022",
            "model_name": "Claude 3.5 Sonnet",
            "provider": "Anthropic",
            "messages": [
                {"role": "user", "content": "one"},
                {"role": "narrator", "content": "ignored"},
                {"role": "assistant", "content": "two"}
            ],
            "created": "2025-03-01T10:00:00",
            "last_updated": "2025-03-01T10:05:00"
        }]);
        fs::write(store.path(), raw.to_string()).unwrap();

        assert_eq!(
            store.load("claude-3-5-sonnet-20241022"),
            vec![Message::user("one"), Message::assistant("two")]
        );
    }

    #[test]
    fn corrupt_file_loads_empty_and_is_replaced_on_save() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ this is not json").unwrap();

        assert!(store.load("model-a").is_empty());

        store.save("model-a", "A", Provider::OpenAi, &sample()).unwrap();
        assert_eq!(store.load("model-a"), sample());
    }

    #[test]
    fn camel_case_records_are_readable_and_other_fields_survive() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        let raw = json!([
            {
                "modelId": "gemini-pro",
                "modelName": "Gemini Pro",
                "provider": "Google",
                "messages": [{"role": "user", "content": "hola"}],
                "createdAt": "2025-01-01T00:00:00Z",
                "lastUpdatedAt": "2025-01-01T00:00:00Z",
                "pinned": true
            }
        ]);
        fs::write(store.path(), raw.to_string()).unwrap();

        assert_eq!(store.load("gemini-pro"), vec![Message::user("hola")]);

        store.save("gpt-4o-2024-08-06", "GPT-4o", Provider::OpenAi, &sample()).unwrap();

        let records = written(&store);
        assert_eq!(records[0]["pinned"], true);
        assert_eq!(records[0]["modelId"], "gemini-pro");
        assert_eq!(records[1]["model_id"], "gpt-4o-2024-08-06");
    }

    #[test]
    fn resaving_camel_case_record_keeps_one_timestamp_key() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        seed(
            &store,
            json!([{
                "modelId": "gemini-pro",
                "modelName": "Gemini Pro",
                "provider": "Google",
                "messages": [{"role": "user", "content": "hola"}],
                "createdAt": "2025-01-01T00:00:00Z",
                "lastUpdatedAt": "2025-01-01T00:00:00Z"
            }]),
        );
        let turns = vec![Message::user("hola"), Message::assistant("que tal")];

        store.save("gemini-pro", "Gemini Pro", Provider::Google, &turns).unwrap();

        assert_eq!(store.load("gemini-pro"), turns);
        let records = written(&store);
        let record = records[0].as_object().unwrap();
        assert!(!record.contains_key("last_updated"));
        assert_ne!(record["lastUpdatedAt"], "2025-01-01T00:00:00Z");
        assert_eq!(record["createdAt"], "2025-01-01T00:00:00Z");

        store.save("gemini-pro", "Gemini Pro", Provider::Google, &turns[..1]).unwrap();
        assert_eq!(store.load("gemini-pro"), turns[..1].to_vec());
    }

    #[test]
    fn mistyped_metadata_does_not_hide_messages() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        seed(
            &store,
            json!([{
                "model_id": "gpt-4o-2024-08-06",
                "model_name": null,
                "provider": 7,
                "messages": [{"role": "user", "content": "still here"}],
                "created": 1735689600
            }]),
        );

        assert_eq!(
            store.load("gpt-4o-2024-08-06"),
            vec![Message::user("still here")]
        );

        store
            .save("gpt-4o-2024-08-06", "GPT-4o", Provider::OpenAi, &sample())
            .unwrap();
        let records = written(&store);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["created"], 1735689600);
        assert_eq!(store.load("gpt-4o-2024-08-06"), sample());
    }

    #[test]
    fn save_into_unwritable_location_reports_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();
        let store = HistoryStore::new(blocker.join("history.json"));

        let err = store
            .save("model-a", "A", Provider::OpenAi, &sample())
            .unwrap_err();

        assert!(matches!(err, HistoryError::Io { .. }));
    }
}
