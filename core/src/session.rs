//! Session management
//!
//! One session per running process: the spawned tool provider, the model
//! client, and the discovered catalog, created lazily by the first turn that
//! needs them and shared by every turn after that. The session is never torn
//! down; the provider process is cleaned up when the host process exits.

use crate::catalog::ToolCatalog;
use crate::config::BridgeConfig;
use crate::error::{ConfigError, Error, Result, SessionError};
use crate::llm::{LlmClient, OpenAiClient};
use crate::provider::{ProviderClient, StdioTransport, ToolProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// The process-wide bundle shared across turns
pub struct Session {
    /// Model client handle
    pub llm: Arc<dyn LlmClient>,
    /// Connected tool provider
    pub provider: Arc<dyn ToolProvider>,
    /// Catalog discovered at session start; read-only afterwards
    pub catalog: ToolCatalog,
}

/// Builds a [`Session`] as an atomic unit: either every part comes up or
/// nothing is cached.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self) -> Result<Session>;
}

/// Production connector: spawn the stdio provider, discover the catalog,
/// construct the model client.
pub struct StdioSessionConnector {
    config: BridgeConfig,
}

impl StdioSessionConnector {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionConnector for StdioSessionConnector {
    async fn connect(&self) -> Result<Session> {
        self.config.validate().map_err(|message| {
            Error::Config(ConfigError::InvalidValue {
                field: "bridge".to_string(),
                value: message,
            })
        })?;

        let transport = StdioTransport::spawn(&self.config.provider).await?;
        let provider: Arc<dyn ToolProvider> = Arc::new(ProviderClient::new(transport));
        let catalog = ToolCatalog::discover(provider.as_ref()).await?;

        match self.config.llm.protocol {
            crate::config::Protocol::OpenAICompat | crate::config::Protocol::AzureOpenAI => {}
            crate::config::Protocol::Custom(ref name) => {
                return Err(Error::Config(ConfigError::InvalidValue {
                    field: "llm.protocol".to_string(),
                    value: format!("unsupported protocol '{}'", name),
                }));
            }
        }
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(&self.config.llm)?);

        Ok(Session {
            llm,
            provider,
            catalog,
        })
    }
}

/// Lazy, at-most-once session initialization shared across turns.
///
/// Concurrent first turns await a single in-flight initialization instead of
/// each spawning a provider process. A failed initialization leaves the cell
/// empty, so the next turn retries setup from scratch.
pub struct SessionManager {
    connector: Arc<dyn SessionConnector>,
    cell: OnceCell<Arc<Session>>,
}

impl SessionManager {
    /// Create a manager using the production stdio connector
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_connector(Arc::new(StdioSessionConnector::new(config)))
    }

    /// Create a manager with an injected connector
    pub fn with_connector(connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            connector,
            cell: OnceCell::new(),
        }
    }

    /// Get the shared session, initializing it on first use.
    ///
    /// Setup failures are wrapped as [`SessionError::Initialization`].
    pub async fn session(&self) -> Result<Arc<Session>> {
        self.cell
            .get_or_try_init(|| async {
                tracing::info!("initializing session: spawning provider and discovering tools");
                let session = self.connector.connect().await.map_err(|e| {
                    tracing::error!("session initialization failed: {}", e);
                    Error::Session(SessionError::Initialization {
                        source: Box::new(e),
                    })
                })?;
                Ok(Arc::new(session))
            })
            .await
            .map(Arc::clone)
    }

    /// Whether a session has been established
    pub fn initialized(&self) -> bool {
        self.cell.initialized()
    }
}
