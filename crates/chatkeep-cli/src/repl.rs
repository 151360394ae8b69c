use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chatkeep_agents::{ChatRuntime, ChatView};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::attach::load_attachment;
use crate::terminal::TerminalView;

const HELP: &str = "\
/new                  start a new chat
/list                 list saved chats
/open <id>            switch to a saved chat
/delete <id>          delete a saved chat
/attach <path> <text> send an image with a message
/incognito            toggle incognito mode
/memory               show what has been remembered
/quit                 leave";

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Send(String),
    New,
    List,
    Open(String),
    Delete(String),
    Attach { path: PathBuf, text: String },
    Incognito,
    Memory,
    Help,
    Quit,
    Invalid(String),
}

impl ReplCommand {
    /// `None` for blank lines.
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Self::Send(line.to_string()));
        };

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };
        let command = match (name, args) {
            ("new", _) => Self::New,
            ("list", _) => Self::List,
            ("open", id) if !id.is_empty() => Self::Open(id.to_string()),
            ("delete", id) if !id.is_empty() => Self::Delete(id.to_string()),
            ("attach", args) => match args.split_once(char::is_whitespace) {
                Some((path, text)) if !text.trim().is_empty() => Self::Attach {
                    path: PathBuf::from(path),
                    text: text.trim().to_string(),
                },
                _ => Self::Invalid("usage: /attach <path> <text>".to_string()),
            },
            ("incognito", _) => Self::Incognito,
            ("memory", _) => Self::Memory,
            ("help", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            ("open" | "delete", _) => Self::Invalid(format!("usage: /{name} <id>")),
            _ => Self::Invalid(format!("unknown command /{name}, try /help")),
        };
        Some(command)
    }
}

/// Interactive loop until `/quit`, EOF or Ctrl-C.
pub async fn run(runtime: &mut ChatRuntime, view: Arc<TerminalView>) -> Result<()> {
    let state = runtime.state();
    println!(
        "chatkeep - model {}{}. Type /help for commands.",
        state.model(),
        if state.is_incognito() { " (incognito)" } else { "" }
    );
    if state.api_key().is_none() {
        println!("No API key stored yet. Run `chatkeep set-key` or set CHATKEEP_API_KEY.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        view.prompt();
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        let Some(command) = ReplCommand::parse(&line) else {
            continue;
        };
        if command == ReplCommand::Quit {
            break;
        }
        execute(runtime, view.as_ref(), command).await;
    }

    // Persist whatever is in memory before leaving.
    runtime.state_mut().save_current_chat().await?;
    Ok(())
}

async fn execute(runtime: &mut ChatRuntime, view: &TerminalView, command: ReplCommand) {
    let result: Result<()> = match command {
        ReplCommand::Send(text) => {
            // The runtime reports send failures inline itself.
            if let Err(e) = runtime.send_message(&text, None).await {
                debug!("send failed: {e}");
            }
            Ok(())
        }
        ReplCommand::Attach { path, text } => match load_attachment(&path).await {
            Ok(attachment) => {
                if let Err(e) = runtime.send_message(&text, Some(attachment)).await {
                    debug!("send failed: {e}");
                }
                Ok(())
            }
            Err(e) => Err(e),
        },
        ReplCommand::New => runtime.new_chat().await.map(|_| ()).map_err(Into::into),
        ReplCommand::List => {
            runtime.show_chats();
            Ok(())
        }
        ReplCommand::Open(id) => runtime.open_chat(&id).await.map_err(Into::into),
        ReplCommand::Delete(id) => match runtime.delete_chat(&id).await {
            Ok(true) => {
                println!("Deleted the current chat, started a new one");
                Ok(())
            }
            Ok(false) => {
                println!("Deleted chat {id}");
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        ReplCommand::Incognito => {
            let on = !runtime.state().is_incognito();
            match runtime.state_mut().set_incognito(on).await {
                Ok(()) => {
                    println!("Incognito {}", if on { "on" } else { "off" });
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        ReplCommand::Memory => {
            let state = runtime.state();
            if !state.memory_enabled() {
                println!("Memory is off");
            } else if state.memory().is_empty() {
                println!("Nothing remembered yet");
            } else {
                println!("{}", state.memory());
            }
            Ok(())
        }
        ReplCommand::Help => {
            println!("{HELP}");
            Ok(())
        }
        ReplCommand::Invalid(message) => {
            println!("{message}");
            Ok(())
        }
        ReplCommand::Quit => Ok(()),
    };

    if let Err(e) = result {
        view.notify_error(&format!("{e:#}"));
    }
}
