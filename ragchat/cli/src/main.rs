//! Ragchat - Terminal Client for Retrieval-Augmented Chat
//!
//! Asks questions against a project's documents and prints the answer as it
//! streams in, followed by the cited sources.
//!
//! # Usage
//!
//! ```bash
//! # Ask in a new conversation
//! ragchat --project 5b0c... ask "What is the refund policy?"
//!
//! # Continue a conversation
//! ragchat ask --conversation 8d1e... "And for digital goods?"
//!
//! # Browse
//! ragchat conversations
//! ragchat history 8d1e...
//!
//! # Decode a captured response body offline
//! ragchat replay capture.txt --chunk-size 7
//!
//! # Verbose logging
//! RUST_LOG=debug ragchat ask "..."
//! ```
//!
//! Connection settings come from `~/.config/ragchat/config.toml` and the
//! `RAGCHAT_*` environment variables; the flags below override both.

mod render;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use ragchat_core::config::{load_config_from_path, ConfigOverrides};
use ragchat_core::{
    aggregate_citations, ChatConfig, ChatPanel, ConversationId, HttpBackend, NotifyLevel,
    PanelEvent, ProjectId, Script, ScriptedBackend, TurnOrchestrator, TurnRequest,
};

/// Ragchat - ask questions about your documents from the terminal
#[derive(Parser, Debug)]
#[command(name = "ragchat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "RAGCHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server origin, e.g. http://localhost:8000
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Bearer token
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Project to talk to
    #[arg(short = 'p', long, value_name = "ID")]
    project: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "RAGCHAT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a question and stream the answer
    Ask {
        /// The question
        question: String,

        /// Continue this conversation instead of starting a new one
        #[arg(long, value_name = "ID")]
        conversation: Option<String>,
    },

    /// List conversations of the project
    Conversations {
        /// Page size
        #[arg(long, default_value_t = 20)]
        limit: u32,

        /// Page offset
        #[arg(long, default_value_t = 0)]
        offset: u32,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the history of a conversation
    History {
        /// Conversation id
        conversation: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Delete a conversation
    Delete {
        /// Conversation id
        conversation: String,
    },

    /// Decode a captured turn response body without a server
    Replay {
        /// File holding the raw response body
        file: PathBuf,

        /// Feed the body in reads of this many bytes
        #[arg(long, default_value_t = 64)]
        chunk_size: usize,
    },
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("ragchat={level},ragchat_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration and apply command-line overrides
fn load_settings(args: &Args) -> Result<ChatConfig> {
    let path = args
        .config
        .clone()
        .or_else(ragchat_core::config::default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(ref url) = args.base_url {
        overrides = overrides.with_base_url(url.clone());
    }
    if let Some(ref token) = args.token {
        overrides = overrides.with_token(token.clone());
    }
    if let Some(ref project) = args.project {
        overrides = overrides.with_project_id(project.clone());
    }
    overrides.apply(&mut config);

    config.validate().context("Invalid configuration")?;
    debug!(source = %config.source(), base_url = %config.base_url, "Configuration loaded");
    Ok(config)
}

fn project_of(config: &ChatConfig) -> Result<ProjectId> {
    config
        .project_id
        .clone()
        .map(ProjectId::from)
        .context("No project given: use --project or set RAGCHAT_PROJECT")
}

/// Print panel events to stderr until the panel goes away
async fn report_events(mut rx: mpsc::Receiver<PanelEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PanelEvent::ConversationAdopted { conversation_id } => {
                eprintln!("\n(conversation {conversation_id})");
            }
            PanelEvent::TurnFinished { skipped_frames, .. } if skipped_frames > 0 => {
                eprintln!("({skipped_frames} malformed frame(s) skipped)");
            }
            PanelEvent::Notify { level, message } => {
                let label = match level {
                    NotifyLevel::Info => "info",
                    NotifyLevel::Warning => "warning",
                    NotifyLevel::Error => "error",
                };
                eprintln!("{label}: {message}");
            }
            other => debug!(event = ?other, "Panel event"),
        }
    }
}

async fn ask(config: &ChatConfig, question: String, conversation: Option<String>) -> Result<()> {
    let project = project_of(config)?;
    let backend = Arc::new(HttpBackend::from_config(config)?);
    let (tx, rx) = mpsc::channel(100);
    let reporter = tokio::spawn(report_events(rx));

    let panel = ChatPanel::new(
        backend,
        project,
        conversation.map(ConversationId::from),
        tx,
    );

    let mut updates = panel.updates();
    let printer = tokio::spawn(async move {
        let mut printed = 0;
        while let Some(snapshot) = updates.next().await {
            let text = snapshot.accumulated_text;
            if text.len() > printed {
                print!("{}", &text[printed..]);
                let _ = std::io::stdout().flush();
                printed = text.len();
            }
        }
    });

    let outcome = panel.submit(question).await;

    // Dropping the panel closes both channels, which ends the two tasks.
    drop(panel);
    let _ = printer.await;
    let _ = reporter.await;

    let outcome = outcome?;
    println!();
    let sources = aggregate_citations(&outcome.citations);
    if !sources.is_empty() {
        println!("\nSources:\n{}", render::format_sources(&sources));
    }
    info!(
        conversation = ?outcome.conversation_id,
        chars = outcome.text.len(),
        "Answer complete"
    );
    Ok(())
}

async fn conversations(config: &ChatConfig, limit: u32, offset: u32, json: bool) -> Result<()> {
    let project = project_of(config)?;
    let backend = HttpBackend::from_config(config)?;
    let list = backend.list_conversations(&project, limit, offset).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else if list.is_empty() {
        println!("No conversations yet.");
    } else {
        for conversation in &list {
            println!("{}", render::format_conversation(conversation));
        }
    }
    Ok(())
}

async fn history(config: &ChatConfig, conversation: String, json: bool) -> Result<()> {
    let project = project_of(config)?;
    let backend = Arc::new(HttpBackend::from_config(config)?);
    let (tx, _rx) = mpsc::channel(8);
    let panel = ChatPanel::new(
        backend,
        project,
        Some(ConversationId::from(conversation)),
        tx,
    );

    panel.load_history().await?;
    let messages = panel.messages();
    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else {
        for message in &messages {
            println!("{}\n", render::format_message(message));
        }
    }
    Ok(())
}

async fn delete(config: &ChatConfig, conversation: String) -> Result<()> {
    let project = project_of(config)?;
    let backend = HttpBackend::from_config(config)?;
    backend
        .delete_conversation(&project, &ConversationId::from(conversation))
        .await?;
    println!("Deleted.");
    Ok(())
}

async fn replay(config: &ChatConfig, file: PathBuf, chunk_size: usize) -> Result<()> {
    let body = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read capture: {}", file.display()))?;
    let chunks = render::split_chunks(&body, chunk_size);
    info!(bytes = body.len(), reads = chunks.len(), "Replaying capture");

    let backend =
        ScriptedBackend::with_scripts([Script::Chunks(chunks)]).with_stream_config(config.stream_config());
    let orchestrator = TurnOrchestrator::new(Arc::new(backend), ProjectId::from("replay"));
    let outcome = orchestrator
        .send(TurnRequest::new("replay"), |id| {
            eprintln!("(conversation {id})");
        })
        .await?;

    println!("{}", outcome.text);
    let sources = aggregate_citations(&outcome.citations);
    if !sources.is_empty() {
        println!("\nSources:\n{}", render::format_sources(&sources));
    }
    if outcome.skipped_frames > 0 {
        eprintln!("({} malformed frame(s) skipped)", outcome.skipped_frames);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = load_settings(&args)?;

    match args.command {
        Command::Ask {
            question,
            conversation,
        } => ask(&config, question, conversation).await,
        Command::Conversations {
            limit,
            offset,
            json,
        } => conversations(&config, limit, offset, json).await,
        Command::History { conversation, json } => history(&config, conversation, json).await,
        Command::Delete { conversation } => delete(&config, conversation).await,
        Command::Replay { file, chunk_size } => replay(&config, file, chunk_size).await,
    }
}
