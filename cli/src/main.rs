//! # toolbridge CLI
//!
//! Command-line interface for toolbridge - a chat orchestrator bridging an
//! LLM with tools discovered from an external provider process.
//!
//! ## Usage
//!
//! - `toolbridge` / `toolbridge serve` - Run the HTTP chat surface
//! - `toolbridge tools` - Spawn the provider and print the tool catalog
//! - `toolbridge chat "message"` - Run a single turn from the terminal

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod server;

use commands::{chat_command, serve_command, tools_command};
use config::CliConfigLoader;

/// toolbridge - tool-calling chat orchestration over an external provider
#[derive(Parser)]
#[command(name = "toolbridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chat orchestrator bridging an LLM with external tool providers")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file or directory path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API key override
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL override
    #[arg(long)]
    base_url: Option<String>,

    /// Model name override
    #[arg(long)]
    model: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP chat surface
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },

    /// Spawn the provider and print the discovered tool catalog
    Tools,

    /// Run a single chat turn from the terminal
    Chat {
        /// The user message for this turn
        message: String,
    },
}

/// Build a configuration loader from CLI arguments
fn build_config_loader(cli: &Cli) -> CliConfigLoader {
    let mut loader = CliConfigLoader::new();

    if let Some(config_path) = &cli.config {
        loader = loader.with_config_override(config_path.clone());
    }

    if let Some(api_key) = &cli.api_key {
        loader = loader.with_api_key_override(api_key.clone());
    }

    if let Some(base_url) = &cli.base_url {
        loader = loader.with_base_url_override(base_url.clone());
    }

    if let Some(model) = &cli.model {
        loader = loader.with_model_override(model.clone());
    }

    loader
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let loader = build_config_loader(&cli);

    match cli.command {
        Some(Commands::Serve { host, port }) => serve_command(loader, host, port).await,
        Some(Commands::Tools) => tools_command(loader).await,
        Some(Commands::Chat { message }) => chat_command(loader, message).await,
        // Default to serving the chat surface
        None => serve_command(loader, "127.0.0.1".to_string(), 3000).await,
    }
}
