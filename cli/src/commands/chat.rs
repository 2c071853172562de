//! One-shot chat command

use crate::config::CliConfigLoader;
use anyhow::Result;
use std::sync::Arc;
use toolbridge_core::llm::ChatOptions;
use toolbridge_core::{ChatRole, Orchestrator, SessionManager, TurnRequest};

/// Run a single turn from the terminal and print the returned messages
pub async fn chat_command(loader: CliConfigLoader, message: String) -> Result<()> {
    let config = loader.load().await?;
    let options = ChatOptions::from_params(&config.llm.params);

    let sessions = Arc::new(SessionManager::new(config));
    let orchestrator = Orchestrator::new(sessions).with_options(options);

    let response = orchestrator
        .run_turn(TurnRequest {
            user_message: message,
            history: vec![],
        })
        .await?;

    for message in response.new_messages {
        let role = match message.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Function => "function",
        };
        println!("{}: {}", role, message.content);
    }

    Ok(())
}
