//! Node settings
//!
//! Loaded from an optional file named by `TOKEN_SYNC_CONFIG`, then from
//! `TOKEN_SYNC__<SECTION>__<KEY>` environment variables.

use common::SerializerKind;
use common::cache::RedisConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use watcher::WatcherOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub bind: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub redis: RedisConfig,
    pub watcher: WatcherOptions,
    pub http: HttpSettings,
    pub serializer: SerializerKind,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Ok(path) = std::env::var("TOKEN_SYNC_CONFIG") {
            builder = builder.add_source(File::with_name(&path).required(false));
        }
        builder
            .add_source(
                Environment::with_prefix("TOKEN_SYNC")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("redis.addrs")
                    .with_list_parse_key("watcher.addrs"),
            )
            .build()?
            .try_deserialize()
    }
}
