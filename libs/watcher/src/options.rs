//! Watcher settings

use common::cache::{RedisConfig, Topology};
use serde::Deserialize;
use uuid::Uuid;

/// Channel used when none is configured
pub const DEFAULT_CHANNEL: &str = "/token-go";

/// Configuration for the consistency watcher
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatcherOptions {
    /// Pub/sub node addresses; cluster mode seeds from all of them
    pub addrs: Vec<String>,
    pub cluster: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: i64,
    /// Shared channel every node publishes to and subscribes on
    pub channel: String,
    /// Drop envelopes this node published itself
    pub ignore_self: bool,
    /// Identity stamped on every published envelope
    pub local_id: String,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            addrs: vec!["redis://localhost:6379".to_string()],
            cluster: false,
            username: None,
            password: None,
            db: 0,
            channel: DEFAULT_CHANNEL.to_string(),
            ignore_self: false,
            local_id: Uuid::new_v4().to_string(),
        }
    }
}

impl WatcherOptions {
    /// Create WatcherOptions from environment variables
    ///
    /// # Environment Variables
    /// - `WATCHER_ADDRS`: comma separated addresses (default: "redis://localhost:6379")
    /// - `WATCHER_CLUSTER`: publish through a Redis Cluster (default: false)
    /// - `WATCHER_USERNAME` / `WATCHER_PASSWORD`: optional credentials
    /// - `WATCHER_DB`: database index (default: 0)
    /// - `WATCHER_CHANNEL`: pub/sub channel (default: "/token-go")
    /// - `WATCHER_IGNORE_SELF`: skip self-published envelopes (default: false)
    /// - `WATCHER_LOCAL_ID`: node identity (default: random UUID)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let addrs = std::env::var("WATCHER_ADDRS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|addr| !addr.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or(defaults.addrs);

        let options = Self {
            addrs,
            cluster: env_flag("WATCHER_CLUSTER"),
            username: std::env::var("WATCHER_USERNAME").ok().filter(|s| !s.is_empty()),
            password: std::env::var("WATCHER_PASSWORD").ok().filter(|s| !s.is_empty()),
            db: std::env::var("WATCHER_DB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            channel: std::env::var("WATCHER_CHANNEL").unwrap_or(defaults.channel),
            ignore_self: env_flag("WATCHER_IGNORE_SELF"),
            local_id: std::env::var("WATCHER_LOCAL_ID").unwrap_or(defaults.local_id),
        };
        options.normalize()
    }

    /// Fill in an empty channel or identity
    pub fn normalize(mut self) -> Self {
        if self.channel.is_empty() {
            self.channel = DEFAULT_CHANNEL.to_string();
        }
        if self.local_id.is_empty() {
            self.local_id = Uuid::new_v4().to_string();
        }
        self
    }

    /// Connection settings for the pub/sub nodes
    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig {
            topology: if self.cluster {
                Topology::Cluster
            } else {
                Topology::Standalone
            },
            addrs: self.addrs.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            db: self.db,
            master_name: None,
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_normalize_fills_defaults() {
        let options = WatcherOptions {
            channel: String::new(),
            local_id: String::new(),
            ..Default::default()
        }
        .normalize();
        assert_eq!(options.channel, "/token-go");
        assert!(Uuid::parse_str(&options.local_id).is_ok());
    }

    #[test]
    fn test_default_identities_differ() {
        assert_ne!(
            WatcherOptions::default().local_id,
            WatcherOptions::default().local_id
        );
    }

    #[test]
    #[serial]
    fn test_watcher_options_from_env() {
        unsafe {
            std::env::set_var("WATCHER_ADDRS", "127.0.0.1:7000,127.0.0.1:7001");
            std::env::set_var("WATCHER_CLUSTER", "true");
            std::env::set_var("WATCHER_IGNORE_SELF", "1");
            std::env::set_var("WATCHER_LOCAL_ID", "node-a");
            std::env::set_var("WATCHER_CHANNEL", "");
        }

        let options = WatcherOptions::from_env();
        assert_eq!(options.addrs, vec!["127.0.0.1:7000", "127.0.0.1:7001"]);
        assert!(options.cluster);
        assert!(options.ignore_self);
        assert_eq!(options.local_id, "node-a");
        assert_eq!(options.channel, "/token-go");
        assert_eq!(options.redis_config().topology, Topology::Cluster);

        unsafe {
            std::env::remove_var("WATCHER_ADDRS");
            std::env::remove_var("WATCHER_CLUSTER");
            std::env::remove_var("WATCHER_IGNORE_SELF");
            std::env::remove_var("WATCHER_LOCAL_ID");
            std::env::remove_var("WATCHER_CHANNEL");
        }
    }
}
