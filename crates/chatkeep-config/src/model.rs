use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent";
const OPENAI_COMPAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub generation: GenerationConfig,
    pub storage: StorageConfig,
    pub log_level: Option<String>,
}

/// Which wire format the completion endpoint speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Turn-content format: `contents[].parts[].text`, key in the query string.
    #[default]
    Gemini,
    /// Message-list format: `messages[].content`, bearer authentication.
    #[serde(alias = "groq")]
    OpenAi,
}

/// Endpoint settings. Unset fields fall back to per-kind defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub summary_model: Option<String>,
    pub history_window: Option<usize>,
    pub persona: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: Option<PathBuf>,
    /// JSON export of the legacy flat key/value storage, imported once.
    pub legacy_import: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "openai" | "groq" => Ok(ProviderKind::OpenAi),
            other => Err(format!("unknown provider kind: {other}")),
        }
    }
}

impl ProviderConfig {
    pub fn base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            match self.kind {
                ProviderKind::Gemini => GEMINI_URL,
                ProviderKind::OpenAi => OPENAI_COMPAT_URL,
            }
            .to_string()
        })
    }

    pub fn model(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            match self.kind {
                ProviderKind::Gemini => "gemini-2.0-flash",
                ProviderKind::OpenAi => "llama-3.3-70b-versatile",
            }
            .to_string()
        })
    }

    pub fn summary_model(&self) -> String {
        self.summary_model.clone().unwrap_or_else(|| {
            match self.kind {
                ProviderKind::Gemini => "gemini-2.0-flash-lite",
                ProviderKind::OpenAi => "openai/gpt-oss-20b",
            }
            .to_string()
        })
    }

    /// Most recent turns sent per request. `None` sends the full history.
    pub fn history_window(&self) -> Option<usize> {
        match (self.history_window, self.kind) {
            (Some(0), _) => None,
            (Some(n), _) => Some(n),
            (None, ProviderKind::Gemini) => None,
            (None, ProviderKind::OpenAi) => Some(20),
        }
    }

    pub fn persona(&self) -> Option<&str> {
        self.persona
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

impl StorageConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".chatkeep"))
                .unwrap_or_else(|| PathBuf::from(".chatkeep"))
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("chatkeep.db")
    }
}
