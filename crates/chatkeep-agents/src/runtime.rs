use std::sync::Arc;

use chatkeep_common::{Attachment, Error, Message, Result, Role};
use chatkeep_config::AppConfig;
use chatkeep_db::{DurableStore, LegacySource};
use tracing::{info, instrument, warn};

use crate::prompt::RequestBuilder;
use crate::providers::{LlmProvider, provider_from_config};
use crate::state::ConversationState;
use crate::summarizer::Summarizer;
use crate::view::ChatView;

/// Drives one conversation session: state, provider, summarization and view.
///
/// Every operation takes `&mut self`, so a completion request always finishes
/// before the next chat switch starts and its reply lands in the chat that
/// sent it.
pub struct ChatRuntime {
    state: ConversationState,
    provider: Arc<dyn LlmProvider>,
    builder: RequestBuilder,
    summarizer: Summarizer,
    view: Arc<dyn ChatView>,
}

impl ChatRuntime {
    pub fn new(
        state: ConversationState,
        provider: Arc<dyn LlmProvider>,
        builder: RequestBuilder,
        summarizer: Summarizer,
        view: Arc<dyn ChatView>,
    ) -> Self {
        Self {
            state,
            provider,
            builder,
            summarizer,
            view,
        }
    }

    /// Wire up the configured provider. Call [`initialize`](Self::initialize) before use.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn DurableStore>,
        view: Arc<dyn ChatView>,
    ) -> Self {
        let provider = provider_from_config(&config.provider);
        info!(
            "using {} provider with model {}",
            provider.provider_id(),
            config.provider.model()
        );
        Self::new(
            ConversationState::new(store, config.provider.model()),
            provider.clone(),
            RequestBuilder::from_config(config),
            Summarizer::from_config(provider, config),
            view,
        )
    }

    pub async fn initialize(&mut self, legacy: Option<&dyn LegacySource>) -> Result<()> {
        self.state.initialize(legacy).await
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ConversationState {
        &mut self.state
    }

    /// Send one user turn and return the assistant's reply.
    ///
    /// The user turn is recorded before the request goes out and stays in
    /// history whatever the outcome. Failures are shown inline and returned.
    #[instrument(skip(self, text, attachment), fields(chat_id = tracing::field::Empty))]
    pub async fn send_message(
        &mut self,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("message must not be empty".to_string()));
        }

        if self.state.current_chat_id().is_none() {
            self.state.create_new_chat().await?;
        }
        tracing::Span::current().record("chat_id", self.state.current_chat_id());

        self.view.render_message(text, Role::User, attachment.as_ref());
        let mut message = Message::user(text);
        if let Some(attachment) = attachment {
            message = message.with_attachment(attachment);
        }
        self.state.push_message(message);

        let Some(api_key) = self.state.api_key().map(str::to_string) else {
            self.state.save_current_chat().await?;
            self.view
                .notify_error("No API key configured. Set one with `chatkeep set-key`.");
            return Err(Error::MissingApiKey);
        };

        self.view.render_loading();
        let request = self.builder.build(&self.state);

        match self.provider.complete(&api_key, &request).await {
            Ok(reply) => {
                self.view.render_message(&reply, Role::Assistant, None);
                self.state.push_message(Message::assistant(reply.clone()));
                self.state.save_current_chat().await?;
                Ok(reply)
            }
            Err(e) => {
                warn!("completion failed: {e}");
                self.view.notify_error(&e.to_string());
                if let Err(store_err) = self.state.save_current_chat().await {
                    warn!("failed to save chat after error: {store_err}");
                    self.view
                        .notify_error(&format!("Your message could not be saved: {store_err}"));
                }
                Err(e)
            }
        }
    }

    /// Summarize the outgoing chat, then start an empty one.
    pub async fn new_chat(&mut self) -> Result<String> {
        self.summarizer.summarize_current(&mut self.state).await;
        let id = self.state.create_new_chat().await?;
        self.view.clear_transcript();
        Ok(id)
    }

    /// Summarize the outgoing chat, then switch to `id` and replay its history.
    pub async fn open_chat(&mut self, id: &str) -> Result<()> {
        if self.state.chat(id).is_none() {
            return Err(Error::UnknownChat(id.to_string()));
        }

        if self.state.current_chat_id() != Some(id) {
            self.summarizer.summarize_current(&mut self.state).await;
            self.state.load_chat(id).await?;
        }

        self.view.clear_transcript();
        for message in self.state.history() {
            self.view
                .render_message(&message.content, message.role, message.attachment.as_ref());
        }
        Ok(())
    }

    /// Returns true when the current chat was deleted and the transcript reset.
    pub async fn delete_chat(&mut self, id: &str) -> Result<bool> {
        if self.state.chat(id).is_none() {
            return Err(Error::UnknownChat(id.to_string()));
        }
        let was_current = self.state.delete_chat(id).await?;
        if was_current {
            self.view.clear_transcript();
        }
        Ok(was_current)
    }

    pub fn show_chats(&self) {
        let chats = self.state.chat_summaries();
        self.view
            .render_chat_list(&chats, self.state.current_chat_id());
    }
}
