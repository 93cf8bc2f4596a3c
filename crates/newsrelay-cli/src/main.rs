use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsrelay_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "newsrelay")]
#[command(author, version, about = "Relay news headlines from a feed and a web page to Telegram")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (defaults to ~/.config/newsrelay/config.toml)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a cycle now and then on every interval until Ctrl+C
    Run,
    /// Run a single cycle and exit
    Once,
    /// Show recently posted links
    History {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
    },
    /// Validate configuration and optionally fetch sources without posting
    Check {
        /// Fetch every source and report which items are new
        #[arg(long)]
        fetch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    config.apply_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Some(Commands::Run) | None => commands::run::run(&config).await,
        Some(Commands::Once) => commands::once::run(&config).await,
        Some(Commands::History { limit }) => commands::history::run(&config, limit).await,
        Some(Commands::Check { fetch }) => commands::check::run(&config, fetch).await,
    }
}
