use chatkeep_common::{Message, Role};
use chatkeep_config::AppConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::providers::{LlmProvider, LlmRequest};
use crate::state::ConversationState;

const SUMMARY_INSTRUCTION: &str = "Summarize the following conversation in at most 2-3 sentences. \
Focus on lasting facts about the user and the topics that were discussed. \
Reply with the summary only.";
const SUMMARY_TEMPERATURE: f64 = 0.3;
const SUMMARY_MAX_TOKENS: u32 = 256;
const MIN_TURNS: usize = 2;

/// Condenses a finished chat into a few sentences of long-term memory.
///
/// Runs only at chat-switch boundaries and never fails the caller: any error
/// is logged and the switch goes ahead.
pub struct Summarizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: SUMMARY_MAX_TOKENS,
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &AppConfig) -> Self {
        Self::new(provider, config.provider.summary_model())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// All preconditions for summarizing the current chat.
    pub fn should_summarize(&self, state: &ConversationState) -> bool {
        if !state.memory_enabled() || state.is_incognito() {
            return false;
        }
        let Some(id) = state.current_chat_id() else {
            return false;
        };
        if state.chat(id).is_some_and(|chat| chat.was_summarized) {
            return false;
        }
        state.history().len() >= MIN_TURNS
    }

    pub fn build_request(&self, history: &[Message]) -> LlmRequest {
        let transcript = history
            .iter()
            .map(|message| {
                let speaker = match message.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                format!("{speaker}: {}", message.content)
            })
            .collect::<Vec<_>>()
            .join("\n");

        LlmRequest {
            model: self.model.clone(),
            messages: vec![Message::user(transcript)],
            system: Some(SUMMARY_INSTRUCTION.to_string()),
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: self.max_tokens,
        }
    }

    /// Summarize the current chat into memory if the policy allows it.
    /// Returns the appended summary, or `None` when skipped or failed.
    pub async fn summarize_current(&self, state: &mut ConversationState) -> Option<String> {
        if !self.should_summarize(state) {
            return None;
        }
        let chat_id = state.current_chat_id()?.to_string();
        let api_key = state.api_key()?.to_string();

        let request = self.build_request(state.history());
        debug!(chat = %chat_id, model = %self.model, "summarizing chat");

        let summary = match self.provider.complete(&api_key, &request).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(chat = %chat_id, "summarization failed: {e}");
                return None;
            }
        };
        if summary.is_empty() {
            warn!(chat = %chat_id, "summarization returned no text");
            return None;
        }

        if let Err(e) = state.append_memory(&summary).await {
            warn!(chat = %chat_id, "failed to store summary: {e}");
            return None;
        }
        if let Err(e) = state.mark_as_summarized(&chat_id).await {
            warn!(chat = %chat_id, "failed to mark chat as summarized: {e}");
        }

        info!(chat = %chat_id, "added chat summary to memory");
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatkeep_common::{Error, Result};
    use chatkeep_db::SqliteStore;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        reply: Result<String>,
        calls: AtomicUsize,
        last_request: Mutex<Option<LlmRequest>>,
    }

    impl ScriptedProvider {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(Error::Transport("connection refused".into())),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn provider_id(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _api_key: &str, request: &LlmRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(Error::Transport("connection refused".into())),
            }
        }
    }

    async fn chatted_state() -> ConversationState {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let mut state = ConversationState::new(store, "main-model");
        state.initialize(None).await.unwrap();
        state.set_api_key("test-key").await.unwrap();
        state.create_new_chat().await.unwrap();
        state.push_message(Message::user("I just moved to Lisbon."));
        state.push_message(Message::assistant("Welcome to Lisbon!"));
        state.save_current_chat().await.unwrap();
        state
    }

    #[tokio::test]
    async fn summarizes_exactly_once_per_chat() {
        let provider = ScriptedProvider::replying("The user lives in Lisbon.");
        let summarizer = Summarizer::new(provider.clone(), "small-model");
        let mut state = chatted_state().await;

        let first = summarizer.summarize_current(&mut state).await;
        let second = summarizer.summarize_current(&mut state).await;

        assert_eq!(first.as_deref(), Some("The user lives in Lisbon."));
        assert!(second.is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.memory(), "The user lives in Lisbon.");
        let id = state.current_chat_id().unwrap();
        assert!(state.chat(id).unwrap().was_summarized);
    }

    #[tokio::test]
    async fn request_uses_summary_model_and_transcript() {
        let provider = ScriptedProvider::replying("summary");
        let summarizer = Summarizer::new(provider.clone(), "small-model");
        let mut state = chatted_state().await;

        summarizer.summarize_current(&mut state).await;

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.model, "small-model");
        assert_eq!(request.system.as_deref(), Some(SUMMARY_INSTRUCTION));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(
            request.messages[0].content,
            "User: I just moved to Lisbon.\nAssistant: Welcome to Lisbon!"
        );
    }

    #[tokio::test]
    async fn skips_when_memory_disabled_or_incognito() {
        let provider = ScriptedProvider::replying("summary");
        let summarizer = Summarizer::new(provider.clone(), "small-model");

        let mut state = chatted_state().await;
        state.set_memory_enabled(false).await.unwrap();
        assert!(summarizer.summarize_current(&mut state).await.is_none());

        let mut state = chatted_state().await;
        state.set_incognito(true).await.unwrap();
        assert!(summarizer.summarize_current(&mut state).await.is_none());

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn skips_short_chats() {
        let provider = ScriptedProvider::replying("summary");
        let summarizer = Summarizer::new(provider.clone(), "small-model");
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let mut state = ConversationState::new(store, "main-model");
        state.initialize(None).await.unwrap();
        state.set_api_key("test-key").await.unwrap();
        state.create_new_chat().await.unwrap();
        state.push_message(Message::user("hi"));

        assert!(!summarizer.should_summarize(&state));
        assert!(summarizer.summarize_current(&mut state).await.is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_is_swallowed_and_retryable() {
        let provider = ScriptedProvider::failing();
        let summarizer = Summarizer::new(provider.clone(), "small-model");
        let mut state = chatted_state().await;

        assert!(summarizer.summarize_current(&mut state).await.is_none());
        assert_eq!(state.memory(), "");
        let id = state.current_chat_id().unwrap();
        assert!(!state.chat(id).unwrap().was_summarized);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_summary_is_discarded() {
        let provider = ScriptedProvider::replying("   ");
        let summarizer = Summarizer::new(provider, "small-model");
        let mut state = chatted_state().await;

        assert!(summarizer.summarize_current(&mut state).await.is_none());
        assert_eq!(state.memory(), "");
    }
}
