use chatkeep_common::{Attachment, ChatSummary, Role};

/// Presentation callbacks driven by [`ChatRuntime`](crate::ChatRuntime).
///
/// The runtime never formats output itself; everything the user sees goes
/// through this trait.
pub trait ChatView: Send + Sync {
    fn render_message(&self, text: &str, role: Role, attachment: Option<&Attachment>);

    /// Shown while a completion request is in flight.
    fn render_loading(&self);

    fn render_chat_list(&self, chats: &[ChatSummary], current: Option<&str>);

    /// Inline error in the transcript. The user's input stays visible.
    fn notify_error(&self, message: &str);

    fn clear_transcript(&self);
}
