//! Tool catalog listing command

use crate::config::CliConfigLoader;
use anyhow::Result;
use toolbridge_core::catalog::ToolCatalog;
use toolbridge_core::provider::{ProviderClient, StdioTransport};
use tracing::info;

/// Spawn the provider, discover the catalog once, and print it
pub async fn tools_command(loader: CliConfigLoader) -> Result<()> {
    let config = loader.load().await?;

    info!("spawning tool provider for catalog discovery");
    let transport = StdioTransport::spawn(&config.provider).await?;
    let provider = ProviderClient::new(transport);
    let catalog = ToolCatalog::discover(&provider).await?;

    println!("🛠️  {} tools available\n", catalog.len());

    for tool in catalog.iter() {
        println!("📦 {}", tool.name);
        // Show first line of description only for brevity
        let first_line = tool.description.lines().next().unwrap_or("");
        if !first_line.is_empty() {
            println!("   {}", first_line);
        }
        println!("   schema: {}", serde_json::to_string(&tool.input_schema)?);
        println!();
    }

    Ok(())
}
