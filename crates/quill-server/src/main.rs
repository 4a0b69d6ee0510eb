//! Quill Server CLI
//!
//! Starts the housekeeping loops for one replica.

use clap::Parser;
use quill_server::{config::ServerConfig, run_once, start_server, ServerError};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Quill Server - background housekeeping for a Quill replica.
#[derive(Debug, Parser)]
#[command(name = "quill-server")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "QUILL_CONFIG")]
    config: Option<PathBuf>,

    /// Run each sweep once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => {
            eprintln!("Warning: No config file specified, using defaults");
            eprintln!("Usage: quill-server --config <path-to-config.toml>");
            ServerConfig::default()
        }
    };

    if cli.once {
        run_once(config).await
    } else {
        start_server(config).await
    }
}
