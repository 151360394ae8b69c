pub mod prompt;
pub mod providers;
pub mod runtime;
pub mod state;
pub mod summarizer;
pub mod view;

pub use prompt::{RequestBuilder, build_system_prompt};
pub use providers::{
    GeminiAdapter, HttpProvider, LlmProvider, LlmRequest, OpenAiAdapter, RequestDescriptor,
    WireAdapter, provider_from_config,
};
pub use runtime::ChatRuntime;
pub use state::ConversationState;
pub use summarizer::Summarizer;
pub use view::ChatView;
