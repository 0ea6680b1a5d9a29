// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Also resolves start_bot arguments against configured defaults into a BotConfig
use crate::buffer::DEFAULT_EVENT_CAPACITY;
use crate::error::{BotError, BotResult};
use crate::paths;
use crate::session::SessionSettings;
use anyhow::{Context, Result};
use bcbot_client::{BotConfig, ClientConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "https://bondage-club-server.herokuapp.com/";
pub const DEFAULT_ORIGIN: &str = "https://www.bondage-europe.com";
pub const DEFAULT_CHATROOM_CONFIG: &str = "chatroom_config.json";
pub const DEFAULT_MCP_HOST: &str = "0.0.0.0";
pub const DEFAULT_MCP_PORT: u16 = 8080;
pub const DEFAULT_MCP_PATH: &str = "/mcp";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub bot: BotDefaults,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the tool surface is exposed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Transport {
    #[default]
    Http,
    Stdio,
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" | "streamable-http" | "streamable_http" => Ok(Transport::Http),
            "stdio" => Ok(Transport::Stdio),
            other => Err(format!(
                "unknown transport '{}', expected 'http' or 'stdio'",
                other
            )),
        }
    }
}

impl TryFrom<String> for Transport {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Transport> for String {
    fn from(value: Transport) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Http => f.write_str("http"),
            Transport::Stdio => f.write_str("stdio"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            host: default_host(),
            port: default_port(),
            path: default_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_start_timeout_secs")]
    pub start_timeout_secs: u64,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_disconnect_timeout_secs")]
    pub disconnect_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_timeout_secs: default_start_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            disconnect_timeout_secs: default_disconnect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Fallbacks for start_bot arguments the caller leaves empty
#[derive(Clone, Serialize, Deserialize)]
pub struct BotDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance_code: Option<String>,
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_chatroom_config_path")]
    pub chatroom_config_path: String,
    /// Directory relative chatroom config paths resolve against (working directory if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
}

impl Default for BotDefaults {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            appearance_code: None,
            server_url: default_server_url(),
            origin: default_origin(),
            chatroom_config_path: default_chatroom_config_path(),
            base_dir: None,
        }
    }
}

// Custom Debug impl to redact the password
impl std::fmt::Debug for BotDefaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotDefaults")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field(
                "appearance_code",
                &self.appearance_code.as_ref().map(|_| "[REDACTED]"),
            )
            .field("server_url", &self.server_url)
            .field("origin", &self.origin)
            .field("chatroom_config_path", &self.chatroom_config_path)
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// When set, logs go to a daily rolling file in this directory instead of stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_host() -> String {
    DEFAULT_MCP_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_MCP_PORT
}

fn default_path() -> String {
    DEFAULT_MCP_PATH.to_string()
}

fn default_start_timeout_secs() -> u64 {
    30
}

fn default_command_timeout_secs() -> u64 {
    15
}

fn default_disconnect_timeout_secs() -> u64 {
    5
}

fn default_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_chatroom_config_path() -> String {
    DEFAULT_CHATROOM_CONFIG.to_string()
}

/// Non-empty environment variable
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn normalize_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

impl Config {
    /// Find the config file, checking in order:
    /// 1. BCBOT_CONFIG_PATH env var (if set)
    /// 2. ./config.toml
    /// 3. ~/.config/bcbot/config.toml
    fn find_config_file() -> Option<PathBuf> {
        if let Some(env_path) = env_var("BCBOT_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration with environment variable overrides.
    /// An explicit path must exist; otherwise the usual locations are searched.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::find_config_file(),
        };

        let mut config = match path {
            Some(config_path) => {
                tracing::info!(
                    path = %config_path.display(),
                    "Loading configuration from file"
                );
                let content = std::fs::read_to_string(&config_path)
                    .with_context(|| format!("Failed to read {}", config_path.display()))?;
                Self::parse(&content)
                    .with_context(|| format!("Failed to parse {}", config_path.display()))?
            }
            None => {
                tracing::info!("No config file found, using environment variables and defaults");
                Config::default()
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.server.path = normalize_path(&config.server.path);
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(val) = env_var("MCP_TRANSPORT") {
            self.server.transport = val
                .parse()
                .map_err(|e: String| anyhow::anyhow!("MCP_TRANSPORT: {}", e))?;
        }
        if let Some(val) = env_var("MCP_HOST") {
            self.server.host = val;
        }
        if let Some(val) = env_var("MCP_PORT") {
            match val.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => {
                    tracing::warn!(
                        value = %val,
                        default = DEFAULT_MCP_PORT,
                        "MCP_PORT is not a valid port number, using default"
                    );
                    self.server.port = DEFAULT_MCP_PORT;
                }
            }
        }
        if let Some(val) = env_var("MCP_PATH") {
            self.server.path = normalize_path(&val);
        }

        if let Some(val) = env_var("BC_USERNAME") {
            self.bot.username = Some(val);
        }
        if let Some(val) = env_var("BC_PASSWORD") {
            self.bot.password = Some(val);
        }
        if let Some(val) = env_var("APPEARANCE_CODE") {
            self.bot.appearance_code = Some(val);
        }
        if let Some(val) = env_var("BC_SERVER_URL") {
            self.bot.server_url = val;
        }
        if let Some(val) = env_var("BC_ORIGIN") {
            self.bot.origin = val;
        }

        if let Some(val) = env_var("BCBOT_CLIENT") {
            self.client.client_type = val;
        }
        if let Some(val) = env_var("BCBOT_EVENT_CAPACITY") {
            self.events.capacity = val.trim().parse().with_context(|| {
                format!("BCBOT_EVENT_CAPACITY must be a valid number, got: {}", val)
            })?;
        }
        if let Some(val) = env_var("BCBOT_START_TIMEOUT_SECS") {
            self.session.start_timeout_secs = val.trim().parse().with_context(|| {
                format!(
                    "BCBOT_START_TIMEOUT_SECS must be a valid number, got: {}",
                    val
                )
            })?;
        }
        if let Some(val) = env_var("BCBOT_COMMAND_TIMEOUT_SECS") {
            self.session.command_timeout_secs = val.trim().parse().with_context(|| {
                format!(
                    "BCBOT_COMMAND_TIMEOUT_SECS must be a valid number, got: {}",
                    val
                )
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.events.capacity == 0 {
            anyhow::bail!("events.capacity must be at least 1");
        }
        if self.session.start_timeout_secs == 0 {
            anyhow::bail!("session.start_timeout_secs must be at least 1");
        }
        if self.session.command_timeout_secs == 0 {
            anyhow::bail!("session.command_timeout_secs must be at least 1");
        }
        if self.session.disconnect_timeout_secs == 0 {
            anyhow::bail!("session.disconnect_timeout_secs must be at least 1");
        }
        if self.server.host.trim().is_empty() {
            anyhow::bail!("server.host must not be empty");
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            start_timeout: Duration::from_secs(self.session.start_timeout_secs),
            disconnect_timeout: Duration::from_secs(self.session.disconnect_timeout_secs),
            event_capacity: self.events.capacity,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.session.command_timeout_secs)
    }
}

/// Arguments of the start_bot tool. Empty or missing fields fall back to `BotDefaults`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct StartBotRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub chatroom_config_path: Option<String>,
    #[serde(default)]
    pub appearance_code: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
}

// Custom Debug impl to redact the password
impl std::fmt::Debug for StartBotRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartBotRequest")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("chatroom_config_path", &self.chatroom_config_path)
            .field(
                "appearance_code",
                &self.appearance_code.as_ref().map(|_| "[REDACTED]"),
            )
            .field("server_url", &self.server_url)
            .field("origin", &self.origin)
            .finish()
    }
}

fn pick(arg: &Option<String>, fallback: Option<&str>) -> Option<String> {
    arg.as_deref()
        .filter(|v| !v.trim().is_empty())
        .or(fallback.filter(|v| !v.trim().is_empty()))
        .map(str::to_string)
}

impl BotDefaults {
    /// Resolve a chatroom config path against `base_dir`
    pub fn chatroom_path(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        match (&self.base_dir, path.is_absolute()) {
            (Some(base), false) => base.join(path),
            _ => path,
        }
    }

    /// Build the BotConfig for one start attempt
    pub async fn resolve(&self, req: &StartBotRequest) -> BotResult<BotConfig> {
        let username = pick(&req.username, self.username.as_deref()).ok_or_else(|| {
            BotError::invalid("username is required (argument or BC_USERNAME)")
        })?;
        let password = pick(&req.password, self.password.as_deref()).ok_or_else(|| {
            BotError::invalid("password is required (argument or BC_PASSWORD)")
        })?;
        let appearance_code =
            pick(&req.appearance_code, self.appearance_code.as_deref()).unwrap_or_default();
        let server_url =
            pick(&req.server_url, Some(self.server_url.as_str())).unwrap_or_else(default_server_url);
        let origin = pick(&req.origin, Some(self.origin.as_str())).unwrap_or_else(default_origin);
        let chatroom_path = pick(&req.chatroom_config_path, Some(self.chatroom_config_path.as_str()))
            .unwrap_or_else(default_chatroom_config_path);

        let path = self.chatroom_path(&chatroom_path);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            BotError::invalid(format!(
                "cannot read chatroom config {}: {}",
                path.display(),
                e
            ))
        })?;
        let chatroom: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
            BotError::invalid(format!(
                "chatroom config {} is not valid JSON: {}",
                path.display(),
                e
            ))
        })?;
        if !chatroom.is_object() {
            return Err(BotError::invalid(format!(
                "chatroom config {} must be a JSON object",
                path.display()
            )));
        }

        Ok(BotConfig {
            username,
            password,
            appearance_code,
            server_url,
            origin,
            chatroom,
        })
    }
}
