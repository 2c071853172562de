//! Simple CLI configuration loader for toolbridge
//!
//! Implements single-source priority loading with flag overrides:
//! 1. --config file/dir (highest priority)
//! 2. Current working directory: ./toolbridge.json or ./.toolbridge/config.json
//! 3. Git repository root: <repo_root>/.toolbridge/config.json
//! 4. XDG config: $XDG_CONFIG_HOME/toolbridge/config.json or ~/.config/toolbridge/config.json
//! 5. Environment variables only (no files)

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use toolbridge_core::{BridgeConfig, ModelParams, Protocol, ProviderConfig, ResolvedLlmConfig};

/// Environment variable naming the provider executable in env-only mode
const PROVIDER_CMD_VAR: &str = "TOOLBRIDGE_PROVIDER_CMD";
/// Environment variable carrying space-separated provider arguments
const PROVIDER_ARGS_VAR: &str = "TOOLBRIDGE_PROVIDER_ARGS";
/// Provider credential variables passed through to the child process
const PROVIDER_PASSTHROUGH_VARS: &[&str] = &["INTEGRATION_APP_TOKEN", "INTEGRATION_KEY"];

/// Raw configuration file format (simple single-file schema)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    /// Protocol to use
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// API key (can be "env:VAR_NAME" for environment variable)
    pub api_key: String,
    /// Base URL (optional, uses protocol default if not specified)
    pub base_url: Option<String>,
    /// Model name
    #[serde(default = "default_model")]
    pub model: String,
    /// Model parameters (optional)
    #[serde(default)]
    pub params: ModelParams,
    /// Tool-provider process configuration
    pub provider: RawProviderConfig,
}

/// Provider section of the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProviderConfig {
    /// Executable to spawn (tilde-expanded)
    pub command: String,
    /// Arguments for the executable
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment for the process (values can be "env:VAR_NAME")
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Bounded wait for provider requests, in seconds
    pub request_timeout_secs: Option<u64>,
}

fn default_protocol() -> String {
    "openai_compat".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

/// CLI configuration loader
pub struct CliConfigLoader {
    /// Override config file/directory path
    config_override: Option<PathBuf>,
    /// Flag overrides
    api_key_override: Option<String>,
    base_url_override: Option<String>,
    model_override: Option<String>,
}

impl CliConfigLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self {
            config_override: None,
            api_key_override: None,
            base_url_override: None,
            model_override: None,
        }
    }

    /// Set config file/directory override
    pub fn with_config_override(mut self, path: PathBuf) -> Self {
        self.config_override = Some(path);
        self
    }

    /// Set API key override
    pub fn with_api_key_override(mut self, api_key: String) -> Self {
        self.api_key_override = Some(api_key);
        self
    }

    /// Set base URL override
    pub fn with_base_url_override(mut self, base_url: String) -> Self {
        self.base_url_override = Some(base_url);
        self
    }

    /// Set model override
    pub fn with_model_override(mut self, model: String) -> Self {
        self.model_override = Some(model);
        self
    }

    /// Load and resolve configuration
    pub async fn load(&self) -> Result<BridgeConfig> {
        // Step 1: Find and load base configuration
        let mut config = if let Some(override_path) = &self.config_override {
            self.load_from_path(override_path).await.with_context(|| {
                format!(
                    "Failed to load config from override path: {}",
                    override_path.display()
                )
            })?
        } else {
            self.search_and_load().await?
        };

        // Step 2: Apply flag overrides
        if let Some(api_key) = &self.api_key_override {
            config.api_key = api_key.clone();
        }
        if let Some(base_url) = &self.base_url_override {
            config.base_url = Some(base_url.clone());
        }
        if let Some(model) = &self.model_override {
            config.model = model.clone();
        }

        // Step 3: Resolve to the final bridge config
        self.resolve_config(config)
    }

    /// Search for config in priority order
    async fn search_and_load(&self) -> Result<RawConfig> {
        // 1. Current working directory
        if let Some(config) = self.try_load_cwd().await? {
            return Ok(config);
        }

        // 2. Git repository root
        if let Some(config) = self.try_load_git_root().await? {
            return Ok(config);
        }

        // 3. XDG config directory
        if let Some(config) = self.try_load_xdg().await? {
            return Ok(config);
        }

        // 4. Environment variables only
        self.try_load_env_only()
    }

    /// Try loading from current working directory
    async fn try_load_cwd(&self) -> Result<Option<RawConfig>> {
        let cwd = std::env::current_dir()?;

        // Try ./toolbridge.json first
        let bridge_json = cwd.join("toolbridge.json");
        if bridge_json.exists() {
            return Ok(Some(self.load_file(&bridge_json).await?));
        }

        // Try ./.toolbridge/config.json
        let bridge_dir_config = cwd.join(".toolbridge").join("config.json");
        if bridge_dir_config.exists() {
            return Ok(Some(self.load_file(&bridge_dir_config).await?));
        }

        Ok(None)
    }

    /// Try loading from git repository root
    async fn try_load_git_root(&self) -> Result<Option<RawConfig>> {
        if let Some(git_root) = self.find_git_root()? {
            let config_path = git_root.join(".toolbridge").join("config.json");
            if config_path.exists() {
                return Ok(Some(self.load_file(&config_path).await?));
            }
        }
        Ok(None)
    }

    /// Try loading from XDG config directory
    async fn try_load_xdg(&self) -> Result<Option<RawConfig>> {
        if let Some(config_dir) = self.get_xdg_config_dir() {
            let config_path = config_dir.join("toolbridge").join("config.json");
            if config_path.exists() {
                return Ok(Some(self.load_file(&config_path).await?));
            }
        }
        Ok(None)
    }

    /// Build a configuration from environment variables only
    fn try_load_env_only(&self) -> Result<RawConfig> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            anyhow!(
                "No configuration found. Please create a toolbridge.json file or set \
                 environment variables like OPENAI_API_KEY and {}",
                PROVIDER_CMD_VAR
            )
        })?;

        let command = std::env::var(PROVIDER_CMD_VAR).map_err(|_| {
            anyhow!(
                "{} must point at the tool-provider executable when no config file is present",
                PROVIDER_CMD_VAR
            )
        })?;

        let args = std::env::var(PROVIDER_ARGS_VAR)
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        // Pass the provider credentials through when present.
        let mut env = HashMap::new();
        for var in PROVIDER_PASSTHROUGH_VARS {
            if let Ok(value) = std::env::var(var) {
                env.insert(var.to_string(), value);
            }
        }

        Ok(RawConfig {
            protocol: default_protocol(),
            api_key,
            base_url: std::env::var("OPENAI_BASE_URL").ok(),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| default_model()),
            params: ModelParams::default(),
            provider: RawProviderConfig {
                command,
                args,
                env,
                request_timeout_secs: None,
            },
        })
    }

    /// Load configuration from a specific path (file or directory)
    async fn load_from_path(&self, path: &Path) -> Result<RawConfig> {
        if path.is_file() {
            self.load_file(path).await
        } else if path.is_dir() {
            let config_file = path.join("config.json");
            if config_file.exists() {
                self.load_file(&config_file).await
            } else {
                Err(anyhow!(
                    "No config.json found in directory: {}",
                    path.display()
                ))
            }
        } else {
            Err(anyhow!("Config path does not exist: {}", path.display()))
        }
    }

    /// Load a single config file
    async fn load_file(&self, path: &Path) -> Result<RawConfig> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find git repository root
    fn find_git_root(&self) -> Result<Option<PathBuf>> {
        let mut current = std::env::current_dir()?;

        loop {
            if current.join(".git").exists() {
                return Ok(Some(current));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }

    /// Get XDG config directory
    fn get_xdg_config_dir(&self) -> Option<PathBuf> {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(dirs::config_dir)
    }

    /// Resolve raw config to a validated BridgeConfig
    fn resolve_config(&self, config: RawConfig) -> Result<BridgeConfig> {
        let protocol = match config.protocol.as_str() {
            "openai_compat" | "openai" => Protocol::OpenAICompat,
            "azure_openai" => Protocol::AzureOpenAI,
            custom => Protocol::Custom(custom.to_string()),
        };

        let api_key = resolve_env_value(&config.api_key)
            .with_context(|| "Failed to resolve api_key".to_string())?;

        let base_url = config.base_url.unwrap_or_else(|| {
            protocol
                .default_base_url()
                .unwrap_or("https://api.openai.com/v1")
                .to_string()
        });

        let llm = ResolvedLlmConfig::new(protocol, base_url, api_key, config.model)
            .with_params(config.params);

        let mut provider =
            ProviderConfig::new(shellexpand::tilde(&config.provider.command).into_owned());
        provider.args = config.provider.args;
        for (key, value) in config.provider.env {
            let resolved = resolve_env_value(&value)
                .with_context(|| format!("Failed to resolve provider env '{}'", key))?;
            provider.env.insert(key, resolved);
        }
        if let Some(timeout) = config.provider.request_timeout_secs {
            provider.request_timeout_secs = timeout;
        }

        let resolved = BridgeConfig { llm, provider };

        resolved
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        Ok(resolved)
    }
}

/// Resolve a config value, handling the "env:VAR_NAME" indirection
fn resolve_env_value(value: &str) -> Result<String> {
    if let Some(var_name) = value.strip_prefix("env:") {
        std::env::var(var_name)
            .with_context(|| format!("Environment variable not found: {}", var_name))
    } else {
        Ok(value.to_string())
    }
}

impl Default for CliConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("toolbridge.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    const FULL_CONFIG: &str = r#"{
        "api_key": "file-key",
        "model": "gpt-4o",
        "provider": {
            "command": "node",
            "args": ["node_modules/@integration-app/mcp-server/dist/index.js"],
            "env": {"INTEGRATION_KEY": "hubspot"},
            "request_timeout_secs": 10
        }
    }"#;

    #[tokio::test]
    async fn test_load_from_explicit_path() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), FULL_CONFIG);

        let config = CliConfigLoader::new()
            .with_config_override(path)
            .load()
            .await
            .unwrap();

        assert_eq!(config.llm.api_key, "file-key");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.provider.command, "node");
        assert_eq!(config.provider.request_timeout_secs, 10);
        assert_eq!(
            config.provider.env.get("INTEGRATION_KEY"),
            Some(&"hubspot".to_string())
        );
    }

    #[tokio::test]
    async fn test_flag_overrides_beat_file_values() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), FULL_CONFIG);

        let config = CliConfigLoader::new()
            .with_config_override(path)
            .with_api_key_override("flag-key".to_string())
            .with_model_override("gpt-4o-mini".to_string())
            .with_base_url_override("https://llm.internal/v1".to_string())
            .load()
            .await
            .unwrap();

        assert_eq!(config.llm.api_key, "flag-key");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.base_url, "https://llm.internal/v1");
    }

    #[tokio::test]
    async fn test_env_indirection_in_config_values() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "api_key": "env:TOOLBRIDGE_TEST_KEY_VAR",
                "provider": {
                    "command": "node",
                    "env": {"INTEGRATION_APP_TOKEN": "env:TOOLBRIDGE_TEST_TOKEN_VAR"}
                }
            }"#,
        );

        std::env::set_var("TOOLBRIDGE_TEST_KEY_VAR", "secret-key");
        std::env::set_var("TOOLBRIDGE_TEST_TOKEN_VAR", "secret-token");

        let config = CliConfigLoader::new()
            .with_config_override(path)
            .load()
            .await
            .unwrap();

        assert_eq!(config.llm.api_key, "secret-key");
        assert_eq!(
            config.provider.env.get("INTEGRATION_APP_TOKEN"),
            Some(&"secret-token".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_provider_section_is_rejected() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), r#"{"api_key": "k", "model": "gpt-4o"}"#);

        let result = CliConfigLoader::new()
            .with_config_override(path)
            .load()
            .await;

        assert!(result.is_err());
    }
}
