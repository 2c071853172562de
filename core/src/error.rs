//! Error types and handling for toolbridge core

use thiserror::Error;

/// Result type alias for toolbridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for toolbridge core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// LLM client errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool-provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },
}

/// LLM client errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// The model call failed or produced no usable choice.
    #[error("Model unavailable: {message}")]
    Unavailable { message: String },
}

/// Tool-provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider executable could not be resolved or spawned.
    #[error("Provider unavailable: {message}")]
    Unavailable { message: String },

    /// No response arrived within the bounded wait.
    #[error("Provider timed out waiting for a response to '{method}'")]
    Timeout { method: String },

    /// The response could not be parsed or correlated.
    #[error("Provider protocol error: {message}")]
    Protocol { message: String },

    /// The provider reported an empty tool catalog.
    #[error("Provider reported no available tools")]
    NoTools,

    /// The provider reported a failed tool invocation.
    #[error("Tool invocation failed: {name} - {message}")]
    ToolCall { name: String, message: String },
}

/// Session lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// First-time setup failed; the session cache stays uninitialized so the
    /// next turn can retry from scratch.
    #[error("Session initialization failed: {source}")]
    Initialization {
        #[source]
        source: Box<Error>,
    },
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Generic(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Generic(msg.to_string())
    }
}
