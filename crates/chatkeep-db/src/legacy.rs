use chatkeep_common::{Chat, Error, Message, Personalization, Result, Role};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::store::{DurableStore, Namespace, SettingKey};

const LEGACY_PREFIX: &str = "legacy:";

/// Read-only view over the old flat string key/value storage.
pub trait LegacySource: Send + Sync {
    fn entries(&self) -> Result<Vec<(String, String)>>;
}

/// Legacy storage exported as a single JSON object.
pub struct JsonLegacySource {
    path: PathBuf,
}

impl JsonLegacySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LegacySource for JsonLegacySource {
    fn entries(&self) -> Result<Vec<(String, String)>> {
        if !self.path.is_file() {
            debug!("no legacy export at {}", self.path.display());
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let object: serde_json::Map<String, Value> = serde_json::from_str(&raw)?;
        Ok(object
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect())
    }
}

/// Outcome of a legacy import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub skipped: bool,
    pub settings: usize,
    pub chats: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyMessage {
    Content { role: Role, content: String },
    Parts { role: Role, parts: Vec<LegacyPart> },
}

#[derive(Deserialize)]
struct LegacyPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyChat {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    history: Vec<LegacyMessage>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    updated_at: Option<i64>,
    #[serde(default)]
    was_summarized: bool,
}

impl From<LegacyMessage> for Message {
    fn from(legacy: LegacyMessage) -> Self {
        match legacy {
            LegacyMessage::Content { role, content } => Message {
                role,
                content,
                attachment: None,
            },
            LegacyMessage::Parts { role, parts } => Message {
                role,
                content: parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("\n"),
                attachment: None,
            },
        }
    }
}

impl LegacyChat {
    fn into_chat(self, key: &str) -> Chat {
        let created_at = self.created_at.unwrap_or(0);
        Chat {
            id: self.id.unwrap_or_else(|| key.to_string()),
            history: self.history.into_iter().map(Message::from).collect(),
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
            was_summarized: self.was_summarized,
        }
    }
}

/// Copy legacy flat storage into `store`.
///
/// Does nothing when the store already holds any record, so it can run on
/// every start. The legacy source is never modified.
pub async fn migrate_legacy(
    store: &dyn DurableStore,
    source: &dyn LegacySource,
) -> Result<MigrationReport> {
    if !store.is_empty().await? {
        debug!("durable store already populated, skipping legacy import");
        return Ok(MigrationReport {
            skipped: true,
            ..Default::default()
        });
    }

    let entries: HashMap<String, String> = match source.entries() {
        Ok(entries) => entries.into_iter().collect(),
        Err(Error::Serialization(e)) => {
            warn!("legacy export is not valid JSON, skipping import: {e}");
            return Ok(MigrationReport {
                skipped: true,
                ..Default::default()
            });
        }
        Err(e) => return Err(e),
    };
    if entries.is_empty() {
        return Ok(MigrationReport {
            skipped: true,
            ..Default::default()
        });
    }

    let mut report = MigrationReport::default();
    for (legacy_key, raw) in &entries {
        let mapped = match map_setting(legacy_key, raw) {
            Ok(mapped) => mapped,
            Err(e) => {
                warn!("skipping malformed legacy value {legacy_key}: {e}");
                continue;
            }
        };

        let (key, value) = match mapped {
            Mapped::Setting(key, value) => (key.as_str().to_string(), value),
            Mapped::Chats => continue,
            Mapped::Unknown => (format!("{LEGACY_PREFIX}{legacy_key}"), json!(raw)),
        };
        store.put(Namespace::Settings, &key, &value).await?;
        report.settings += 1;
    }

    if let Some(raw) = entries.get("chatbot_chats") {
        match serde_json::from_str::<HashMap<String, Value>>(raw) {
            Ok(chats) => {
                for (key, value) in chats {
                    let chat = match serde_json::from_value::<LegacyChat>(value) {
                        Ok(legacy) => legacy.into_chat(&key),
                        Err(e) => {
                            warn!("skipping malformed legacy chat {key}: {e}");
                            continue;
                        }
                    };
                    store
                        .put(Namespace::Chats, &chat.id, &serde_json::to_value(&chat)?)
                        .await?;
                    report.chats += 1;
                }
            }
            Err(e) => warn!("skipping malformed legacy chat index: {e}"),
        }
    }

    info!(
        "imported legacy storage: {} settings, {} chats",
        report.settings, report.chats
    );
    Ok(report)
}

enum Mapped {
    Setting(SettingKey, Value),
    Chats,
    Unknown,
}

fn map_setting(legacy_key: &str, raw: &str) -> Result<Mapped> {
    let mapped = match legacy_key {
        "groq_api_key" | "gemini_api_key" => Mapped::Setting(SettingKey::ApiKey, json!(raw)),
        "groq_model" => Mapped::Setting(SettingKey::ModelId, json!(raw)),
        "chatbot_memory" => Mapped::Setting(SettingKey::Memory, json!(raw)),
        "chatbot_memory_enabled" => Mapped::Setting(SettingKey::MemoryEnabled, json!(raw == "true")),
        "chatbot_incognito" => Mapped::Setting(SettingKey::Incognito, json!(raw == "true")),
        "chatbot_current_chat" => Mapped::Setting(SettingKey::CurrentChat, json!(raw)),
        "chatbot_personalization" => {
            let personalization: Personalization = serde_json::from_str(raw)
                .map_err(|e| Error::Validation(format!("invalid personalization: {e}")))?;
            Mapped::Setting(
                SettingKey::Personalization,
                serde_json::to_value(personalization)?,
            )
        }
        "chatbot_chats" => Mapped::Chats,
        _ => Mapped::Unknown,
    };
    Ok(mapped)
}
