use crate::config::api_keys::resolve_api_key;
use crate::config::constants::{agent, env, memory, model, paths, platform, server, store};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentSection {
    #[serde(default = "default_agent_id")]
    pub default_agent_id: String,

    #[serde(default = "default_max_depth")]
    pub max_recursion_depth: usize,

    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_agent_id() -> String {
    agent::DEFAULT_AGENT_ID.to_string()
}
fn default_max_depth() -> usize {
    agent::MAX_RECURSION_DEPTH
}
fn default_history_window() -> usize {
    agent::HISTORY_WINDOW
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            default_agent_id: default_agent_id(),
            max_recursion_depth: default_max_depth(),
            history_window: default_history_window(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelSection {
    /// Base URL of the OpenAI-compatible proxy; `/v1` is appended
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Prefer the environment variable; kept here for local setups
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    model::DEFAULT_ENDPOINT.to_string()
}
fn default_model_id() -> String {
    model::DEFAULT_MODEL_ID.to_string()
}
fn default_temperature() -> f32 {
    model::DEFAULT_TEMPERATURE
}
fn default_max_retries() -> u32 {
    model::DEFAULT_MAX_RETRIES
}
fn default_retry_delay() -> u64 {
    model::DEFAULT_RETRY_DELAY_SECS
}
fn default_request_timeout() -> u64 {
    model::DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model_id: default_model_id(),
            api_key: None,
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ModelSection {
    pub fn api_base(&self) -> String {
        format!("{}/v1", self.endpoint.trim_end_matches('/'))
    }

    pub fn api_key(&self) -> String {
        resolve_api_key(env::MODEL_API_KEY, self.api_key.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreSection {
    /// SQLite file path, or `sqlite://` / `file:` URI
    #[serde(default = "default_store_uri")]
    pub uri: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

fn default_store_uri() -> String {
    store::DEFAULT_DB_FILE.to_string()
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            uri: default_store_uri(),
            user: None,
            password: None,
        }
    }
}

impl StoreSection {
    /// Filesystem path of the database, with URI schemes stripped
    pub fn database_path(&self) -> PathBuf {
        let raw = self
            .uri
            .strip_prefix("sqlite://")
            .or_else(|| self.uri.strip_prefix("file:"))
            .unwrap_or(&self.uri);
        PathBuf::from(raw)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemorySection {
    #[serde(default = "default_evaluation_timeout")]
    pub evaluation_timeout_secs: u64,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_evaluation_timeout() -> u64 {
    memory::EVALUATION_TIMEOUT_SECS
}
fn default_workers() -> usize {
    memory::DEFAULT_WORKERS
}
fn default_queue_capacity() -> usize {
    memory::DEFAULT_QUEUE_CAPACITY
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            evaluation_timeout_secs: default_evaluation_timeout(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl MemorySection {
    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_secs(self.evaluation_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformSection {
    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

fn default_max_message_length() -> usize {
    platform::MAX_MESSAGE_LENGTH
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            bot_token: None,
            max_message_length: default_max_message_length(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_port() -> u16 {
    server::DEFAULT_PORT
}
fn default_environment() -> String {
    server::DEFAULT_ENVIRONMENT.to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            environment: default_environment(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EzraConfig {
    #[serde(default)]
    pub agent: AgentSection,

    #[serde(default)]
    pub model: ModelSection,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub memory: MemorySection,

    #[serde(default)]
    pub platform: PlatformSection,

    #[serde(default)]
    pub server: ServerSection,
}

impl EzraConfig {
    /// Apply overrides from a variable lookup. The process environment is
    /// passed in by [`ConfigManager`]; tests pass a map.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(port) = get(env::PORT).and_then(|value| value.parse().ok()) {
            self.server.port = port;
        }
        if let Some(environment) = get(env::ENVIRONMENT) {
            self.server.environment = environment;
        }
        if let Some(uri) = get(env::DB_PATH).or_else(|| get(env::STORE_URI)) {
            self.store.uri = uri;
        }
        if let Some(user) = get(env::STORE_USER) {
            self.store.user = Some(user);
        }
        if let Some(password) = get(env::STORE_PASSWORD) {
            self.store.password = Some(password);
        }
        if let Some(endpoint) = get(env::MODEL_ENDPOINT) {
            self.model.endpoint = endpoint;
        }
        if let Some(model_id) = get(env::MODEL_ID) {
            self.model.model_id = model_id;
        }
        if let Some(key) = get(env::MODEL_API_KEY) {
            self.model.api_key = Some(key);
        }
        if let Some(token) = get(env::BOT_TOKEN) {
            self.platform.bot_token = Some(token);
        }
    }

    pub fn is_production(&self) -> bool {
        self.server.environment.eq_ignore_ascii_case("production")
    }
}

/// Loads `ezra.toml` from an explicit path, the working directory or
/// `~/.ezra/`, then layers environment overrides on top.
pub struct ConfigManager {
    config: EzraConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    pub fn load() -> Result<Self> {
        let workspace = std::env::current_dir().context("Failed to resolve working directory")?;
        Self::load_from_workspace(workspace)
    }

    pub fn load_from_workspace(workspace: impl AsRef<Path>) -> Result<Self> {
        let local = workspace.as_ref().join(paths::CONFIG_FILE_NAME);
        if local.exists() {
            return Self::load_from_file(local);
        }

        if let Some(home) = Self::get_home_dir() {
            let home_config = home.join(paths::HOME_CONFIG_DIR).join(paths::CONFIG_FILE_NAME);
            if home_config.exists() {
                return Self::load_from_file(home_config);
            }
        }

        debug!("no configuration file found, using defaults");
        let mut config = EzraConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(Self {
            config,
            config_path: None,
        })
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: EzraConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        debug!(path = %path.display(), "loaded configuration");

        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    pub fn config(&self) -> &EzraConfig {
        &self.config
    }

    pub fn into_config(self) -> EzraConfig {
        self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn get_home_dir() -> Option<PathBuf> {
        dirs::home_dir()
    }

    pub fn create_sample_config(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(&EzraConfig::default())
            .context("Failed to serialize default configuration")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
