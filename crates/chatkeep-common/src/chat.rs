use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::message::Message;

const TITLE_CHARS: usize = 40;
const PREVIEW_CHARS: usize = 50;
const ID_SUFFIX_LEN: usize = 9;
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Persisted chat record. Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub was_summarized: bool,
}

/// Listing row for the chat history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub updated_at: i64,
}

/// Free-text profile injected into the system prompt outside incognito mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Personalization {
    pub name: String,
    pub hobbies: String,
    pub instructions: String,
    pub about: String,
}

impl Chat {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: id.into(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
            was_summarized: false,
        }
    }

    pub fn summary(&self) -> ChatSummary {
        let title = self
            .history
            .first()
            .map(|m| truncate(&m.content, TITLE_CHARS))
            .unwrap_or_else(|| "New chat".to_string());
        let preview = if self.history.len() > 1 {
            self.history
                .last()
                .map(|m| truncate(&m.content, PREVIEW_CHARS))
                .unwrap_or_default()
        } else {
            "No messages".to_string()
        };

        ChatSummary {
            id: self.id.clone(),
            title,
            preview,
            updated_at: if self.updated_at > 0 {
                self.updated_at
            } else {
                self.created_at
            },
        }
    }
}

impl Personalization {
    pub fn is_empty(&self) -> bool {
        [&self.name, &self.hobbies, &self.instructions, &self.about]
            .iter()
            .all(|field| field.trim().is_empty())
    }
}

/// Build a chat id from the current time plus a random base36 suffix.
/// Collisions are improbable, not impossible.
pub fn generate_chat_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("chat_{}_{}", Utc::now().timestamp_millis(), suffix)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
