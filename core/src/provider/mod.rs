//! Tool-provider integration: transport, wire types, and the provider seam

pub mod transport;
pub mod wire;

pub use transport::StdioTransport;
pub use wire::{ContentSegment, RpcError, RpcOutcome, ToolDescriptor, ToolOutput};

use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

/// The two operations the orchestrator needs from a tool provider.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Ask the provider for its tool catalog.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke one tool by name with the given arguments.
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolOutput>;
}

/// Production [`ToolProvider`] backed by a [`StdioTransport`].
pub struct ProviderClient {
    transport: StdioTransport,
}

impl ProviderClient {
    pub fn new(transport: StdioTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ToolProvider for ProviderClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        match self.transport.request("tools/list", None).await? {
            RpcOutcome::Success(value) => {
                let listing: wire::ListToolsResult =
                    serde_json::from_value(value).map_err(|e| ProviderError::Protocol {
                        message: format!("malformed tool listing: {}", e),
                    })?;
                Ok(listing.tools)
            }
            RpcOutcome::Failure(error) => Err(ProviderError::Protocol {
                message: format!("tools/list failed: {} (code {})", error.message, error.code),
            }
            .into()),
        }
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolOutput> {
        let params = json!({
            "name": name,
            "arguments": arguments,
        });

        match self.transport.request("tools/call", Some(params)).await? {
            RpcOutcome::Success(value) => {
                let output = ToolOutput::from_value(value).map_err(|e| ProviderError::Protocol {
                    message: format!("malformed tool result: {}", e),
                })?;

                // A result flagged as an error is a failed invocation, not a
                // tool result to feed back to the model.
                if output.is_error {
                    return Err(ProviderError::ToolCall {
                        name: name.to_string(),
                        message: output.text(),
                    }
                    .into());
                }

                Ok(output)
            }
            RpcOutcome::Failure(error) => Err(ProviderError::ToolCall {
                name: name.to_string(),
                message: error.message,
            }
            .into()),
        }
    }
}
