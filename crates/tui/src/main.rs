//! parley - peer-to-peer Markdown chat in the terminal.

use anyhow::{Context, Result};
use clap::Parser;
use parley_core::transport::{ChatEndpoint, Identity};
use parley_core::Config;
use std::fs::File;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod markdown;
mod ui;

/// Peer-to-peer Markdown chat
#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Peer-to-peer Markdown chat in the terminal", long_about = None)]
struct Cli {
    /// Display name for this device (defaults to the hostname)
    #[arg(short, long)]
    name: Option<String>,

    /// Peer id to connect to on startup
    #[arg(short, long)]
    connect: Option<String>,

    /// Print the local peer id and exit
    #[arg(long)]
    show_id: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The terminal is taken over by the UI, so logs go to a file.
    let log_path = parley_core::platform::data_dir().join("parley.log");
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = File::create(&log_path)
        .with_context(|| format!("failed to create log file at {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,iroh=warn,netwatch=error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();

    let config = Config::load().unwrap_or_default();

    let name = cli.name.clone().or_else(|| config.display_name.clone());
    let identity = Identity::load_or_create(name).context("failed to load identity")?;

    if cli.show_id {
        println!("{}", identity.peer_id);
        return Ok(());
    }

    info!("starting parley as {}", identity.peer_id);

    let endpoint = ChatEndpoint::bind(identity)
        .await
        .context("failed to bind endpoint")?;

    let result = app::App::new(endpoint.clone(), config, cli.connect)
        .run()
        .await;

    endpoint.close().await;
    result
}
