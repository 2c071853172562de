//! Tool catalog discovery and schema translation
//!
//! The catalog is discovered once per session and cached for the session's
//! lifetime; tools the provider adds later are invisible until restart. This
//! is a deliberate staleness trade-off.

use crate::error::{ProviderError, Result};
use crate::llm::{FunctionDefinition, ToolDefinition};
use crate::provider::{ToolDescriptor, ToolProvider};
use std::collections::HashSet;

/// The set of tools discovered from the provider at session start
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// Discover the catalog from the provider.
    ///
    /// Validates the listing is a non-empty sequence of well-formed
    /// descriptors; an empty catalog is a hard initialization failure
    /// ([`ProviderError::NoTools`]) since the orchestrator has nothing to
    /// offer the model without tools.
    pub async fn discover(provider: &dyn ToolProvider) -> Result<Self> {
        let tools = provider.list_tools().await?;

        if tools.is_empty() {
            return Err(ProviderError::NoTools.into());
        }

        let mut seen = HashSet::new();
        for tool in &tools {
            if tool.name.is_empty() {
                return Err(ProviderError::Protocol {
                    message: "tool descriptor with empty name".to_string(),
                }
                .into());
            }
            if !tool.input_schema.is_object() {
                return Err(ProviderError::Protocol {
                    message: format!("tool '{}' has a non-object input schema", tool.name),
                }
                .into());
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(ProviderError::Protocol {
                    message: format!("duplicate tool name '{}' in catalog", tool.name),
                }
                .into());
            }
        }

        tracing::info!("discovered {} tools from provider", tools.len());

        Ok(Self { tools })
    }

    /// Number of tools in the catalog
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    /// Whether a tool with the given name was discovered
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over the descriptors in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    /// Translate the catalog into the model's function-calling declarations.
    ///
    /// A pure, order-preserving 1:1 projection: no filtering, no renaming.
    /// The catalog stays the single source of truth for capability exposure.
    pub fn to_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                },
            })
            .collect()
    }
}
