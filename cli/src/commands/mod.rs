//! CLI command implementations

pub mod chat;
pub mod serve;
pub mod tools;

pub use chat::chat_command;
pub use serve::serve_command;
pub use tools::tools_command;
