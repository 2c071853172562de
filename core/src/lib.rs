//! # toolbridge Core
//!
//! Core library for toolbridge - a chat orchestrator that bridges a
//! conversational LLM with tools discovered from an external provider
//! process.
//!
//! The library is organized around these concepts:
//!
//! - **Transport/Provider**: a child process speaking framed JSON-RPC over
//!   its standard streams, spawned once and shared across turns.
//! - **Catalog**: the tools discovered from the provider at session start,
//!   translated 1:1 into the model's function-calling schema.
//! - **Session**: the lazily-initialized, process-wide bundle of provider,
//!   model client, and catalog.
//! - **Orchestrator**: the two-pass turn protocol - model decides, tool
//!   runs, model answers.

// Core modules
pub mod catalog;
pub mod config;
pub mod error;
pub mod llm;
pub mod provider;
pub mod session;
pub mod turn;

// Re-export commonly used types
pub use catalog::ToolCatalog;
pub use config::{BridgeConfig, ModelParams, Protocol, ProviderConfig, ResolvedLlmConfig};
pub use error::{Error, Result};
pub use session::{Session, SessionConnector, SessionManager};
pub use turn::{ChatMessage, ChatRole, Orchestrator, TurnRequest, TurnResponse};

/// Current version of the toolbridge-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for the library
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Initialize tracing with a specific debug mode
pub fn init_tracing_with_debug(debug: bool) {
    let filter = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();
}
