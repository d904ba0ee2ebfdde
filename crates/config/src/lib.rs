//! Configuration loading, validation, and management for ToolRelay.
//!
//! Loads `.env` from the working directory, then `~/.toolrelay/config.toml`,
//! then applies environment variable overrides. Everything is read once at
//! startup; values a host cannot run without are checked by
//! [`AppConfig::require_api_key`] and [`AppConfig::bot_settings`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.toolrelay/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which hosted model API to call
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model override; falls back to the provider's default model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Provider API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Discord bot settings
    #[serde(default)]
    pub discord: DiscordConfig,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("gateway", &self.gateway)
            .field("discord", &self.discord)
            .finish()
    }
}

/// Supported model APIs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Model used when the config does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-3-5-sonnet-20241022",
            ProviderKind::Gemini => "gemini-1.5-flash",
        }
    }

    /// Provider-specific environment variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }

    fn api_key_hint(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "create a key at https://console.anthropic.com/",
            ProviderKind::Gemini => "create a free key at https://makersuite.google.com/app/apikey",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(ConfigError::ValidationError(format!(
                "unknown provider '{other}' (expected 'anthropic' or 'gemini')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on model calls per invocation
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Per model call timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Replaces the built-in tool-using assistant instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_iterations() -> u32 {
    5
}
fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            request_timeout_secs: default_request_timeout_secs(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Discord presence activity kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityType {
    Playing,
    Streaming,
    Listening,
    #[default]
    Watching,
    Competing,
}

impl ActivityType {
    /// Numeric activity type used by the Discord gateway.
    pub fn code(&self) -> u8 {
        match self {
            ActivityType::Playing => 0,
            ActivityType::Streaming => 1,
            ActivityType::Listening => 2,
            ActivityType::Watching => 3,
            ActivityType::Competing => 5,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Channel that receives scheduled posts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    #[serde(default = "default_post_interval_minutes")]
    pub post_interval_minutes: u64,

    #[serde(default = "default_initial_post_delay_secs")]
    pub initial_post_delay_secs: u64,

    #[serde(default = "default_stats_interval_minutes")]
    pub stats_interval_minutes: u64,

    /// Questions the scheduled poster picks from
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// Presence text
    #[serde(default = "default_status")]
    pub status: String,

    #[serde(default)]
    pub activity_type: ActivityType,
}

fn default_post_interval_minutes() -> u64 {
    5
}
fn default_initial_post_delay_secs() -> u64 {
    5
}
fn default_stats_interval_minutes() -> u64 {
    30
}
fn default_status() -> String {
    "🤖 AI Knowledge Sharing".into()
}
fn default_topics() -> Vec<String> {
    [
        "What is artificial intelligence?",
        "Explain machine learning in simple terms",
        "What are the benefits of AI?",
        "How does deep learning work?",
        "What is natural language processing?",
        "Explain neural networks",
        "What are AI ethics?",
        "How is AI used in everyday life?",
        "What is the difference between AI and machine learning?",
        "What are the future trends in AI?",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            channel_id: None,
            post_interval_minutes: default_post_interval_minutes(),
            initial_post_delay_secs: default_initial_post_delay_secs(),
            stats_interval_minutes: default_stats_interval_minutes(),
            topics: default_topics(),
            status: default_status(),
            activity_type: ActivityType::default(),
        }
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("channel_id", &self.channel_id)
            .field("post_interval_minutes", &self.post_interval_minutes)
            .field("initial_post_delay_secs", &self.initial_post_delay_secs)
            .field("stats_interval_minutes", &self.stats_interval_minutes)
            .field("topics", &self.topics.len())
            .field("status", &self.status)
            .field("activity_type", &self.activity_type)
            .finish()
    }
}

/// Everything the Discord bot needs, with required values resolved.
#[derive(Clone)]
pub struct BotSettings {
    pub bot_token: String,
    pub channel_id: String,
    pub initial_delay: Duration,
    pub post_interval: Duration,
    pub stats_interval: Duration,
    pub topics: Vec<String>,
    pub status: String,
    pub activity_type: ActivityType,
}

impl std::fmt::Debug for BotSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotSettings")
            .field("bot_token", &"[REDACTED]")
            .field("channel_id", &self.channel_id)
            .field("initial_delay", &self.initial_delay)
            .field("post_interval", &self.post_interval)
            .field("stats_interval", &self.stats_interval)
            .field("topics", &self.topics.len())
            .field("status", &self.status)
            .field("activity_type", &self.activity_type)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from `.env`, the default config path, and the
    /// process environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
        }

        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (highest priority).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = lookup("TOOLRELAY_PROVIDER") {
            self.provider = provider.parse()?;
        }

        if let Some(model) = lookup("TOOLRELAY_MODEL") {
            self.model = Some(model);
        }

        if let Some(key) = lookup("TOOLRELAY_API_KEY").or_else(|| lookup(self.provider.api_key_env())) {
            self.api_key = Some(key);
        }

        if let Some(token) = lookup("DISCORD_TOKEN") {
            self.discord.bot_token = Some(token);
        }

        if let Some(channel) = lookup("DISCORD_CHANNEL_ID") {
            self.discord.channel_id = Some(channel);
        }

        if let Some(minutes) = lookup("POST_INTERVAL_MINUTES") {
            self.discord.post_interval_minutes = minutes.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "POST_INTERVAL_MINUTES must be a whole number of minutes, got '{minutes}'"
                ))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolrelay")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.request_timeout_secs must be at least 1".into(),
            ));
        }

        if self.discord.post_interval_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "discord.post_interval_minutes must be at least 1".into(),
            ));
        }

        if self.discord.stats_interval_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "discord.stats_interval_minutes must be at least 1".into(),
            ));
        }

        if self.discord.topics.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "discord.topics must contain at least one topic".into(),
            ));
        }

        Ok(())
    }

    /// The model to request: the configured override or the provider default.
    pub fn effective_model(&self) -> &str {
        self.model.as_deref().unwrap_or(self.provider.default_model())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// The API key, or a `MissingValue` error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ConfigError::MissingValue {
                name: self.provider.api_key_env(),
                hint: self.provider.api_key_hint(),
            }),
        }
    }

    /// Resolve everything the Discord bot needs, failing on the first
    /// missing required value.
    pub fn bot_settings(&self) -> Result<BotSettings, ConfigError> {
        let bot_token = self
            .discord
            .bot_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingValue {
                name: "DISCORD_TOKEN",
                hint: "create a bot at https://discord.com/developers/applications",
            })?;

        let channel_id = self
            .discord
            .channel_id
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or(ConfigError::MissingValue {
                name: "DISCORD_CHANNEL_ID",
                hint: "enable Developer Mode in Discord and copy the channel ID",
            })?;

        self.require_api_key()?;

        let topics = self
            .discord
            .topics
            .iter()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect();

        Ok(BotSettings {
            bot_token,
            channel_id,
            initial_delay: Duration::from_secs(self.discord.initial_post_delay_secs),
            post_interval: Duration::from_secs(self.discord.post_interval_minutes * 60),
            stats_interval: Duration::from_secs(self.discord.stats_interval_minutes * 60),
            topics,
            status: self.discord.status.clone(),
            activity_type: self.discord.activity_type,
        })
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            gateway: GatewayConfig::default(),
            discord: DiscordConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("{name} is not set ({hint})")]
    MissingValue { name: &'static str, hint: &'static str },
}

impl ConfigError {
    /// The short headline shown to HTTP clients.
    pub fn headline(&self) -> String {
        match self {
            ConfigError::MissingValue { name, .. } => format!("{name} is not set"),
            _ => "Invalid configuration".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider, ProviderKind::Anthropic);
        assert_eq!(config.effective_model(), "claude-3-5-sonnet-20241022");
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.discord.topics.len(), 10);
        assert_eq!(config.discord.activity_type, ActivityType::Watching);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = AppConfig::default_toml();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider, config.provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.discord.topics, config.discord.topics);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            provider = "gemini"

            [discord]
            channel_id = "123"
            activity_type = "LISTENING"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.provider, ProviderKind::Gemini);
        assert_eq!(parsed.effective_model(), "gemini-1.5-flash");
        assert_eq!(parsed.discord.activity_type.code(), 2);
        assert_eq!(parsed.discord.post_interval_minutes, 5);
    }

    #[test]
    fn invalid_values_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.discord.topics = vec!["  ".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider, ProviderKind::Anthropic);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "temperature = 0.2\n[agent]\nmax_iterations = 3\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.agent.max_iterations, 3);

        std::fs::write(&path, "temperature = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_pick_provider_specific_key() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("TOOLRELAY_PROVIDER", "gemini"),
                ("GEMINI_API_KEY", "g-key"),
                ("ANTHROPIC_API_KEY", "a-key"),
                ("POST_INTERVAL_MINUTES", "15"),
            ]))
            .unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.require_api_key().unwrap(), "g-key");
        assert_eq!(config.discord.post_interval_minutes, 15);
    }

    #[test]
    fn generic_key_wins_over_provider_key() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[("TOOLRELAY_API_KEY", "t-key"), ("ANTHROPIC_API_KEY", "a-key")]))
            .unwrap();
        assert_eq!(config.require_api_key().unwrap(), "t-key");
    }

    #[test]
    fn bad_env_values_rejected() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("TOOLRELAY_PROVIDER", "openai")])).is_err());
        assert!(config.apply_env(env(&[("POST_INTERVAL_MINUTES", "soon")])).is_err());
    }

    #[test]
    fn missing_api_key_names_variable() {
        let config = AppConfig::default();
        let err = config.require_api_key().unwrap_err();
        assert_eq!(err.headline(), "ANTHROPIC_API_KEY is not set");
    }

    #[test]
    fn bot_settings_require_token_channel_and_key() {
        let mut config = AppConfig::default();
        let err = config.bot_settings().unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue { name: "DISCORD_TOKEN", .. }));

        config.discord.bot_token = Some("token".into());
        let err = config.bot_settings().unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue { name: "DISCORD_CHANNEL_ID", .. }));

        config.discord.channel_id = Some("42".into());
        assert!(config.bot_settings().is_err());

        config.api_key = Some("key".into());
        let settings = config.bot_settings().unwrap();
        assert_eq!(settings.post_interval, Duration::from_secs(300));
        assert_eq!(settings.initial_delay, Duration::from_secs(5));
        assert_eq!(settings.stats_interval, Duration::from_secs(1800));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.discord.bot_token = Some("discord-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("discord-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
