//! Application configuration structs
//!
//! Loads configuration from environment variables and an optional `.env` file.
//! Command-line flags are applied on top by the binary.

use bridge_core::{IgnoreSet, ShardInfo};
use serde::Deserialize;
use std::env;

/// Main bridge configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub app: AppSettings,
    pub discord: DiscordConfig,
    pub broker: BrokerConfig,
    pub events: EventsConfig,
    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Gateway session configuration
#[derive(Clone, Deserialize)]
pub struct DiscordConfig {
    /// Gateway auth token, sent verbatim in the Authorization header
    pub token: String,
    #[serde(default)]
    pub shard_id: u32,
    #[serde(default = "default_shard_count")]
    pub shard_count: u32,
    #[serde(default = "default_intents")]
    pub intents: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
}

impl DiscordConfig {
    /// Shard identity derived from the configured id and count
    #[must_use]
    pub fn shard(&self) -> ShardInfo {
        ShardInfo::new(self.shard_id, self.shard_count)
    }
}

// The token must never reach the logs.
impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"***")
            .field("shard_id", &self.shard_id)
            .field("shard_count", &self.shard_count)
            .field("intents", &self.intents)
            .field("api_base", &self.api_base)
            .field("gateway_url", &self.gateway_url)
            .finish()
    }
}

/// Message broker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Connection URI, validated when connecting
    #[serde(default)]
    pub uri: String,
    #[serde(default = "default_events_destination")]
    pub events_destination: String,
}

/// Event filtering configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsConfig {
    /// Event names dropped before serialization
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl EventsConfig {
    /// Build the ignore filter
    #[must_use]
    pub fn ignore_set(&self) -> IgnoreSet {
        self.ignore.iter().collect()
    }
}

// Default value functions
fn default_app_name() -> String {
    "gateway-bridge".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_shard_count() -> u32 {
    1
}

fn default_intents() -> u64 {
    // Every intent that does not need to be enabled in the developer portal
    3_243_773
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".to_string()
}

fn default_events_destination() -> String {
    "/events".to_string()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Split a comma separated list, dropping blank entries
pub(crate) fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl BridgeConfig {
    /// Load configuration from environment variables
    ///
    /// Reads a `.env` file first when one is present. Missing values fall back
    /// to defaults; call [`BridgeConfig::validate`] once overrides are applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let shard_id = match lookup("SHARD_ID").filter(|s| !s.trim().is_empty()) {
            Some(s) => s
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SHARD_ID", s))?,
            None => 0,
        };
        let shard_count = match lookup("SHARD_COUNT").filter(|s| !s.trim().is_empty()) {
            Some(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidValue("SHARD_COUNT", s))?
                .max(1),
            None => default_shard_count(),
        };
        let intents = match lookup("DISCORD_INTENTS").filter(|s| !s.trim().is_empty()) {
            Some(s) => s
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DISCORD_INTENTS", s))?,
            None => default_intents(),
        };
        let debug = match lookup("DEBUG") {
            Some(s) => parse_bool(&s).ok_or(ConfigError::InvalidValue("DEBUG", s))?,
            None => false,
        };

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            discord: DiscordConfig {
                token: lookup("DISCORD_TOKEN").unwrap_or_default(),
                shard_id,
                shard_count,
                intents,
                api_base: lookup("DISCORD_API_BASE").unwrap_or_else(default_api_base),
                gateway_url: lookup("DISCORD_GATEWAY_URL").unwrap_or_else(default_gateway_url),
            },
            broker: BrokerConfig {
                uri: lookup("BROKER_URI").unwrap_or_default(),
                events_destination: lookup("EVENTS_DESTINATION")
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(default_events_destination),
            },
            events: EventsConfig {
                ignore: lookup("IGNORE_EVENTS")
                    .map(|s| split_list(&s))
                    .unwrap_or_default(),
            },
            debug,
        })
    }

    /// Check values that cannot be defaulted
    ///
    /// The broker URI is deliberately left to the broker connector, which
    /// reports each URI problem as its own error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discord.token.trim().is_empty() {
            return Err(ConfigError::MissingVar("DISCORD_TOKEN"));
        }
        if self.discord.shard_id >= self.discord.shard_count {
            return Err(ConfigError::InvalidValue(
                "SHARD_ID",
                format!(
                    "shard id {} must be lower than shard count {}",
                    self.discord.shard_id, self.discord.shard_count
                ),
            ));
        }
        if self.broker.events_destination.is_empty() {
            return Err(ConfigError::MissingVar("EVENTS_DESTINATION"));
        }
        Ok(())
    }

    /// Replace the ignore list with a comma separated value
    pub fn set_ignore_list(&mut self, list: &str) {
        self.events.ignore = split_list(list);
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
