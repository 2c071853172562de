//! HTTP serving command

use crate::config::CliConfigLoader;
use crate::server::{self, ServerConfig};
use anyhow::Result;
use std::sync::Arc;
use toolbridge_core::llm::ChatOptions;
use toolbridge_core::{Orchestrator, SessionManager};

/// Run the HTTP chat surface
pub async fn serve_command(loader: CliConfigLoader, host: String, port: u16) -> Result<()> {
    let config = loader.load().await?;
    let options = ChatOptions::from_params(&config.llm.params);

    // Lazy by design: the provider process is spawned and the catalog
    // discovered by the first turn that needs them.
    let sessions = Arc::new(SessionManager::new(config));
    let orchestrator = Arc::new(Orchestrator::new(sessions).with_options(options));

    server::serve(ServerConfig::new(host, port), orchestrator).await
}
