use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use uuid::Uuid;

use bankbot_server::app::build_orchestrator;
use bankbot_server::config::Settings;
use bankbot_server::services::dialog::WELCOME_MESSAGE;
use bankbot_server::services::Session;

#[derive(Parser, Debug)]
#[command(name = "bankbot", version, about = "Bank assistant chat in the terminal")]
struct Args {
    /// Settings file (TOML). Defaults to config/settings.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the semantic cache similarity threshold (0.0 - 1.0)
    #[arg(long)]
    threshold: Option<f32>,
}

const EXIT_COMMANDS: [&str; 2] = ["exit", "quit"];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(threshold) = args.threshold {
        settings.cache.similarity_threshold = threshold;
    }

    let orchestrator = build_orchestrator(&settings).await?;
    let mut session = Session::new(Uuid::new_v4());
    info!("Session {} started", session.id);

    println!("Bot: {}", WELCOME_MESSAGE);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();

        if message.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&message.to_lowercase().as_str()) {
            break;
        }

        let reply = orchestrator.handle_turn(&mut session, message).await;
        println!("Bot: {}", reply.text);
    }

    println!("Goodbye!");
    Ok(())
}
