use async_trait::async_trait;
use chatkeep_common::Result;
use std::collections::HashMap;

/// The two record spaces of the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Settings,
    Chats,
}

/// Logical names of the persisted settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    ApiKey,
    ModelId,
    MemoryEnabled,
    Memory,
    Personalization,
    Incognito,
    CurrentChat,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::ApiKey => "api_key",
            SettingKey::ModelId => "model_id",
            SettingKey::MemoryEnabled => "memory_enabled",
            SettingKey::Memory => "memory",
            SettingKey::Personalization => "personalization",
            SettingKey::Incognito => "incognito",
            SettingKey::CurrentChat => "current_chat",
        }
    }
}

/// Asynchronous key/value store with a settings space and a chat space.
///
/// A returned error means the write was not durably committed; it says
/// nothing about the validity of the caller's in-memory state.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<serde_json::Value>>;

    async fn put(&self, namespace: Namespace, key: &str, value: &serde_json::Value)
    -> Result<()>;

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<()>;

    async fn list_all(&self, namespace: Namespace) -> Result<HashMap<String, serde_json::Value>>;

    /// True when neither record space holds anything.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.list_all(Namespace::Settings).await?.is_empty()
            && self.list_all(Namespace::Chats).await?.is_empty())
    }
}
