//! Minimal configuration module for toolbridge core
//!
//! Only exports pure data types. All loading logic is in CLI layer.

pub mod types;

pub use types::{BridgeConfig, ModelParams, Protocol, ProviderConfig, ResolvedLlmConfig};
