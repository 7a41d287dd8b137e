//! Configuration structs

mod app_config;

pub use app_config::{
    AppSettings, BridgeConfig, BrokerConfig, ConfigError, DiscordConfig, Environment,
    EventsConfig,
};
