mod attach;
mod repl;
mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chatkeep_agents::ChatRuntime;
use chatkeep_common::Personalization;
use chatkeep_config::{AppConfig, ConfigLoader};
use chatkeep_db::{JsonLegacySource, LegacySource, SqliteStore};
use chatkeep_security::RedactingWriter;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::terminal::TerminalView;

const API_KEY_ENV: &str = "CHATKEEP_API_KEY";

#[derive(Parser)]
#[command(name = "chatkeep", version)]
#[command(about = "Terminal chat client with persistent history and rolling memory", long_about = None)]
struct Cli {
    /// Path to a config file (default: ~/.chatkeep/config.yml)
    #[arg(long, global = true, env = "CHATKEEP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session (default)
    Chat,
    /// List saved chats, newest first
    History,
    /// Delete a saved chat
    Delete {
        /// Chat id as shown by `history`
        id: String,
    },
    /// Store the provider API key (prompts when omitted; empty clears it)
    SetKey { key: Option<String> },
    /// Override the chat model
    SetModel { model: String },
    /// Edit the profile used in the system prompt (prompts when no flags are given)
    Personalize {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        hobbies: Option<String>,
        #[arg(long)]
        about: Option<String>,
        #[arg(long)]
        instructions: Option<String>,
    },
    /// Toggle incognito mode (no personalization, memory or summaries)
    Incognito { state: Toggle },
    /// Toggle long-term memory or print it
    Memory { action: MemoryAction },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Clone, Copy, ValueEnum)]
enum MemoryAction {
    On,
    Off,
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = ConfigLoader::new().load(cli.config.as_deref())?;
    init_tracing(config.log_level.as_deref());

    let view = Arc::new(TerminalView::new());
    let mut runtime = open_runtime(&config, view.clone()).await?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => repl::run(&mut runtime, view).await?,
        Commands::History => runtime.show_chats(),
        Commands::Delete { id } => {
            runtime.delete_chat(&id).await?;
            println!("Deleted chat {id}");
        }
        Commands::SetKey { key } => {
            let key = match key {
                Some(key) => key,
                None => dialoguer::Password::new()
                    .with_prompt("API key")
                    .allow_empty_password(true)
                    .interact()
                    .context("failed to read API key")?,
            };
            runtime.state_mut().set_api_key(&key).await?;
            if runtime.state().api_key().is_some() {
                println!("API key saved");
            } else {
                println!("API key cleared");
            }
        }
        Commands::SetModel { model } => {
            runtime.state_mut().set_model(&model).await?;
            println!("Model set to {}", runtime.state().model());
        }
        Commands::Personalize {
            name,
            hobbies,
            about,
            instructions,
        } => {
            let current = runtime.state().personalization().clone();
            let updated = if name.is_none()
                && hobbies.is_none()
                && about.is_none()
                && instructions.is_none()
            {
                prompt_personalization(&current)?
            } else {
                Personalization {
                    name: name.unwrap_or(current.name),
                    hobbies: hobbies.unwrap_or(current.hobbies),
                    about: about.unwrap_or(current.about),
                    instructions: instructions.unwrap_or(current.instructions),
                }
            };
            runtime.state_mut().save_personalization(updated).await?;
            println!("Personalization saved");
        }
        Commands::Incognito { state } => {
            let on = matches!(state, Toggle::On);
            runtime.state_mut().set_incognito(on).await?;
            println!("Incognito {}", if on { "on" } else { "off" });
        }
        Commands::Memory { action } => match action {
            MemoryAction::On | MemoryAction::Off => {
                let on = matches!(action, MemoryAction::On);
                runtime.state_mut().set_memory_enabled(on).await?;
                println!("Memory {}", if on { "on" } else { "off" });
            }
            MemoryAction::Show => {
                let state = runtime.state();
                println!(
                    "Memory is {}",
                    if state.memory_enabled() { "on" } else { "off" }
                );
                if state.memory().is_empty() {
                    println!("(nothing remembered yet)");
                } else {
                    println!("{}", state.memory());
                }
            }
        },
    }

    Ok(())
}

fn init_tracing(log_level: Option<&str>) {
    let fallback = match log_level {
        Some(level) if level.contains('=') => level.to_string(),
        Some(level) => format!("chatkeep={level}"),
        None => "chatkeep=info".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(RedactingWriter::stderr())
        .with_target(false)
        .init();
}

async fn open_runtime(config: &AppConfig, view: Arc<TerminalView>) -> Result<ChatRuntime> {
    let db_path = config.storage.database_path();
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    debug!("database at {}", db_path.display());

    let mut runtime = ChatRuntime::from_config(config, Arc::new(store), view);

    let legacy = config
        .storage
        .legacy_import
        .as_ref()
        .map(JsonLegacySource::new);
    runtime
        .initialize(legacy.as_ref().map(|source| source as &dyn LegacySource))
        .await?;

    if runtime.state().api_key().is_none() {
        if let Some(key) = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()) {
            info!("seeding API key from {API_KEY_ENV}");
            runtime.state_mut().set_api_key(&key).await?;
        }
    }

    Ok(runtime)
}

fn prompt_personalization(current: &Personalization) -> Result<Personalization> {
    let ask = |label: &str, initial: &str| -> Result<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(label)
            .with_initial_text(initial)
            .allow_empty(true)
            .interact_text()
            .with_context(|| format!("failed to read {label}"))
    };

    Ok(Personalization {
        name: ask("Name", &current.name)?,
        hobbies: ask("Hobbies and interests", &current.hobbies)?,
        about: ask("About you", &current.about)?,
        instructions: ask("Special instructions", &current.instructions)?,
    })
}
