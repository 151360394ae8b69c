use std::io::Write;

use chatkeep_agents::ChatView;
use chatkeep_common::{Attachment, ChatSummary, Role};
use chrono::{Local, TimeZone};

/// Plain-text rendering on stdout.
#[derive(Default)]
pub struct TerminalView;

impl TerminalView {
    pub fn new() -> Self {
        Self
    }

    pub fn prompt(&self) {
        print!("> ");
        let _ = std::io::stdout().flush();
    }
}

impl ChatView for TerminalView {
    fn render_message(&self, text: &str, role: Role, attachment: Option<&Attachment>) {
        match role {
            Role::User => {
                println!("you: {text}");
                if let Some(attachment) = attachment {
                    println!("     [{} attached]", attachment.media_type);
                }
            }
            Role::Assistant => println!("\n{text}\n"),
        }
    }

    fn render_loading(&self) {
        println!("...");
    }

    fn render_chat_list(&self, chats: &[ChatSummary], current: Option<&str>) {
        if chats.is_empty() {
            println!("No saved chats");
            return;
        }
        for chat in chats {
            let marker = if current == Some(chat.id.as_str()) { "*" } else { " " };
            let updated = Local
                .timestamp_millis_opt(chat.updated_at)
                .single()
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            println!("{marker} {}  {updated}  {}", chat.id, chat.title);
            println!("    {}", chat.preview);
        }
    }

    fn notify_error(&self, message: &str) {
        println!("\n[error] {message}\n");
    }

    fn clear_transcript(&self) {
        println!("{}", "-".repeat(40));
    }
}
