// Wren - AI study copilot
// CLI entry point: wires the engine together and runs a line-oriented chat.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use wren::backend::RemoteBackend;
use wren::chat::{ChatMessage, StreamOrchestrator};
use wren::config::Settings;
use wren::embedding::{EmbeddingTable, ExemplarSet};
use wren::services::ServiceHandles;
use wren::tools::ToolRegistry;
use wren::trigger::TriggerEngine;

#[derive(Parser)]
#[command(name = "wren", about = "AI study copilot with campus tools")]
struct Args {
    /// Config file (default: ~/.config/wren/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the backend endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Override the backend model
    #[arg(long)]
    model: Option<String>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "wren=info",
        1 => "wren=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut settings = match &args.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(endpoint) = args.endpoint {
        settings.backend.endpoint = endpoint;
    }
    if let Some(model) = args.model {
        settings.backend.model = model;
    }

    let table = match &settings.embedding_table {
        Some(path) => EmbeddingTable::load(path).context("failed to load embedding table")?,
        None => {
            tracing::warn!("no embedding table configured; tool triggering disabled");
            EmbeddingTable::empty(50)
        }
    };

    let trigger = Arc::new(TriggerEngine::new(
        Arc::new(table),
        ExemplarSet::defaults(),
        settings.trigger_threshold,
    ));
    let registry = Arc::new(ToolRegistry::new(ServiceHandles::in_memory()));
    let backend = Arc::new(RemoteBackend::new(
        settings.backend.endpoint.clone(),
        settings.backend.model.clone(),
        settings.api_key(),
    )?);
    let orchestrator = StreamOrchestrator::new(
        backend,
        trigger,
        registry,
        settings.max_tool_permission,
    );

    eprintln!("wren ready ({}). Type a message; 'exit' quits.", settings.backend.model);

    let mut history: Vec<ChatMessage> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("> ");
        std::io::stderr().flush().ok();

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        history.push(ChatMessage::user(line));

        let cancel = CancellationToken::new();
        let mut stream = orchestrator.stream_turn(history.clone(), cancel.clone());

        let mut reply = ChatMessage::pending_assistant();
        let mut failed = false;
        while let Some(chunk) = stream.recv().await {
            match chunk {
                Ok(chunk) => {
                    print!("{}", chunk.text);
                    std::io::stdout().flush().ok();
                    reply.append_text(&chunk.text);
                    if let Some(tool) = chunk.tool_call {
                        reply.set_tool_call(tool);
                    }
                }
                Err(e) => {
                    eprintln!("\nerror: {e}");
                    failed = true;
                    break;
                }
            }
        }
        println!();

        if failed {
            // Discard the half-formed turn
            history.pop();
        } else {
            history.push(reply);
        }
    }

    Ok(())
}
