use chatkeep_common::{
    Chat, ChatSummary, Error, Message, Personalization, Result, generate_chat_id,
};
use chatkeep_db::{DurableStore, LegacySource, Namespace, SettingKey, migrate_legacy};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Canonical chat history and settings, mirrored to a [`DurableStore`].
///
/// `history` is always the authoritative content of the current chat. Every
/// operation that moves the current-chat pointer writes the outgoing chat
/// first. Mutating methods take `&mut self`, so no two of them can interleave.
///
/// When a store write fails the error is returned, but in-memory changes
/// made before the failure are kept.
pub struct ConversationState {
    store: Arc<dyn DurableStore>,
    default_model: String,
    initialized: bool,
    current_chat_id: Option<String>,
    history: Vec<Message>,
    chats: HashMap<String, Chat>,
    api_key: Option<String>,
    model: Option<String>,
    personalization: Personalization,
    incognito: bool,
    memory_enabled: bool,
    memory: String,
}

impl ConversationState {
    pub fn new(store: Arc<dyn DurableStore>, default_model: impl Into<String>) -> Self {
        Self {
            store,
            default_model: default_model.into(),
            initialized: false,
            current_chat_id: None,
            history: Vec::new(),
            chats: HashMap::new(),
            api_key: None,
            model: None,
            personalization: Personalization::default(),
            incognito: false,
            memory_enabled: true,
            memory: String::new(),
        }
    }

    /// Load settings and chats, importing `legacy` first when the store is empty.
    /// Repeat calls do nothing.
    pub async fn initialize(&mut self, legacy: Option<&dyn LegacySource>) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        if let Some(source) = legacy {
            migrate_legacy(self.store.as_ref(), source).await?;
        }

        self.api_key = self
            .load_setting::<String>(SettingKey::ApiKey)
            .await?
            .filter(|k| !k.trim().is_empty());
        self.model = self
            .load_setting::<String>(SettingKey::ModelId)
            .await?
            .filter(|m| !m.trim().is_empty());
        self.personalization = self
            .load_setting(SettingKey::Personalization)
            .await?
            .unwrap_or_default();
        self.incognito = self.load_setting(SettingKey::Incognito).await?.unwrap_or(false);
        self.memory_enabled = self
            .load_setting(SettingKey::MemoryEnabled)
            .await?
            .unwrap_or(true);
        self.memory = self.load_setting(SettingKey::Memory).await?.unwrap_or_default();

        self.chats.clear();
        for (id, raw) in self.store.list_all(Namespace::Chats).await? {
            match serde_json::from_value::<Chat>(raw) {
                Ok(chat) => {
                    self.chats.insert(id, chat);
                }
                Err(e) => warn!("ignoring unreadable chat record {id}: {e}"),
            }
        }

        let pointer: Option<String> = self.load_setting(SettingKey::CurrentChat).await?;
        match pointer {
            Some(id) if self.chats.contains_key(&id) => {
                self.history = self.chats[&id].history.clone();
                self.current_chat_id = Some(id);
            }
            Some(id) => {
                warn!("current chat {id} no longer exists, clearing pointer");
                self.current_chat_id = None;
                self.history.clear();
                self.store
                    .delete(Namespace::Settings, SettingKey::CurrentChat.as_str())
                    .await?;
            }
            None => {
                self.current_chat_id = None;
                self.history.clear();
            }
        }

        self.initialized = true;
        info!(
            "conversation state ready: {} chats, current={:?}",
            self.chats.len(),
            self.current_chat_id
        );
        Ok(())
    }

    /// Start an empty chat and make it current. Returns its id.
    pub async fn create_new_chat(&mut self) -> Result<String> {
        if self.current_chat_id.is_some() && !self.history.is_empty() {
            self.save_current_chat().await?;
        }

        let id = generate_chat_id();
        let chat = Chat::new(&id);
        self.history.clear();
        self.current_chat_id = Some(id.clone());
        self.chats.insert(id.clone(), chat.clone());
        debug!("created chat {id}");

        self.put_chat(&chat).await?;
        self.put_setting(SettingKey::CurrentChat, json!(id)).await?;
        Ok(id)
    }

    /// Write the in-memory history into the current chat record.
    pub async fn save_current_chat(&mut self) -> Result<()> {
        let Some(id) = self.current_chat_id.clone() else {
            return Ok(());
        };

        let chat = self
            .chats
            .entry(id.clone())
            .or_insert_with(|| Chat::new(&id));
        chat.history = self.history.clone();
        chat.updated_at = Utc::now().timestamp_millis().max(chat.updated_at);
        let snapshot = chat.clone();

        self.put_chat(&snapshot).await
    }

    /// Make `id` the current chat. Unknown ids fail without touching state.
    pub async fn load_chat(&mut self, id: &str) -> Result<()> {
        if !self.chats.contains_key(id) {
            return Err(Error::UnknownChat(id.to_string()));
        }

        if self.current_chat_id.is_some() && !self.history.is_empty() {
            self.save_current_chat().await?;
        }

        self.history = self.chats[id].history.clone();
        self.current_chat_id = Some(id.to_string());
        debug!("switched to chat {id}");

        self.put_setting(SettingKey::CurrentChat, json!(id)).await
    }

    /// Remove a chat. Returns true when it was the current chat, in which
    /// case a fresh empty chat has already replaced it.
    pub async fn delete_chat(&mut self, id: &str) -> Result<bool> {
        self.chats.remove(id);
        let was_current = self.current_chat_id.as_deref() == Some(id);
        if was_current {
            self.current_chat_id = None;
            self.history.clear();
        }

        self.store.delete(Namespace::Chats, id).await?;
        info!("deleted chat {id}");

        if was_current {
            self.create_new_chat().await?;
        }
        Ok(was_current)
    }

    pub async fn set_api_key(&mut self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            self.api_key = None;
            return self
                .store
                .delete(Namespace::Settings, SettingKey::ApiKey.as_str())
                .await;
        }
        self.api_key = Some(key.to_string());
        self.put_setting(SettingKey::ApiKey, json!(key)).await
    }

    pub async fn set_model(&mut self, model: &str) -> Result<()> {
        let model = model.trim();
        if model.is_empty() {
            return Err(Error::Validation("model id must not be empty".to_string()));
        }
        self.model = Some(model.to_string());
        self.put_setting(SettingKey::ModelId, json!(model)).await
    }

    pub async fn set_incognito(&mut self, incognito: bool) -> Result<()> {
        self.incognito = incognito;
        self.put_setting(SettingKey::Incognito, json!(incognito)).await
    }

    pub async fn set_memory_enabled(&mut self, enabled: bool) -> Result<()> {
        self.memory_enabled = enabled;
        self.put_setting(SettingKey::MemoryEnabled, json!(enabled))
            .await
    }

    pub async fn save_personalization(&mut self, personalization: Personalization) -> Result<()> {
        self.personalization = Personalization {
            name: personalization.name.trim().to_string(),
            hobbies: personalization.hobbies.trim().to_string(),
            instructions: personalization.instructions.trim().to_string(),
            about: personalization.about.trim().to_string(),
        };
        let value = serde_json::to_value(&self.personalization)?;
        self.put_setting(SettingKey::Personalization, value).await
    }

    /// Append `text` to memory on a new line and persist the whole memory.
    pub async fn append_memory(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if self.memory.is_empty() {
            self.memory = text.to_string();
        } else {
            self.memory.push('\n');
            self.memory.push_str(text);
        }
        self.put_setting(SettingKey::Memory, json!(self.memory))
            .await
    }

    /// Flag a chat as summarized. Unknown ids are ignored.
    pub async fn mark_as_summarized(&mut self, chat_id: &str) -> Result<()> {
        let Some(chat) = self.chats.get_mut(chat_id) else {
            return Ok(());
        };
        chat.was_summarized = true;
        let snapshot = chat.clone();
        self.put_chat(&snapshot).await
    }

    /// Append a turn to the current chat's in-memory history.
    pub fn push_message(&mut self, message: Message) {
        self.history.push(message);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn current_chat_id(&self) -> Option<&str> {
        self.current_chat_id.as_deref()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn chat(&self, id: &str) -> Option<&Chat> {
        self.chats.get(id)
    }

    /// Chats for the history view, most recently updated first.
    pub fn chat_summaries(&self) -> Vec<ChatSummary> {
        let mut summaries: Vec<ChatSummary> = self.chats.values().map(Chat::summary).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        summaries
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(&self.default_model)
    }

    pub fn personalization(&self) -> &Personalization {
        &self.personalization
    }

    pub fn is_incognito(&self) -> bool {
        self.incognito
    }

    pub fn memory_enabled(&self) -> bool {
        self.memory_enabled
    }

    pub fn memory(&self) -> &str {
        &self.memory
    }

    async fn load_setting<T: DeserializeOwned>(&self, key: SettingKey) -> Result<Option<T>> {
        let Some(raw) = self.store.get(Namespace::Settings, key.as_str()).await? else {
            return Ok(None);
        };
        match serde_json::from_value(raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("ignoring unreadable setting {}: {e}", key.as_str());
                Ok(None)
            }
        }
    }

    async fn put_setting(&self, key: SettingKey, value: serde_json::Value) -> Result<()> {
        self.store
            .put(Namespace::Settings, key.as_str(), &value)
            .await
    }

    async fn put_chat(&self, chat: &Chat) -> Result<()> {
        self.store
            .put(Namespace::Chats, &chat.id, &serde_json::to_value(chat)?)
            .await
    }
}
