pub mod chat;
pub mod error;
pub mod message;

pub use chat::{Chat, ChatSummary, Personalization, generate_chat_id};
pub use error::{Error, Result};
pub use message::{Attachment, Message, Role};
