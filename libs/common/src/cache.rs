//! Redis connection settings shared by every adapter topology
//!
//! This module describes how to reach the backing store: which topology is
//! deployed, the node addresses and the credentials applied to each node.

use redis::cluster::{ClusterClient, ClusterClientBuilder};
use redis::{ConnectionAddr, ConnectionInfo, IntoConnectionInfo};
use serde::Deserialize;

use crate::error::{StoreError, StoreResult};

/// Backing store deployment shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Single node
    #[default]
    Standalone,
    /// Redis Cluster with slot-aware routing
    Cluster,
    /// Client-side hash ring over independent shards
    Ring,
    /// Primary resolved through sentinels, with failover
    Sentinel,
}

impl std::str::FromStr for Topology {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standalone" | "single" => Ok(Topology::Standalone),
            "cluster" => Ok(Topology::Cluster),
            "ring" => Ok(Topology::Ring),
            "sentinel" | "failover" => Ok(Topology::Sentinel),
            other => Err(StoreError::Configuration(format!(
                "unknown Redis topology: {}",
                other
            ))),
        }
    }
}

/// Configuration for Redis connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub topology: Topology,
    /// Node addresses as `host:port` or `redis://` URLs.
    ///
    /// Ring shards may be named with `name=address`; sentinel mode lists
    /// the sentinels rather than the primary.
    pub addrs: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Database index, ignored by cluster nodes
    pub db: i64,
    /// Primary name watched by the sentinels
    pub master_name: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            topology: Topology::Standalone,
            addrs: vec!["redis://localhost:6379".to_string()],
            username: None,
            password: None,
            db: 0,
            master_name: None,
        }
    }
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_TOPOLOGY`: standalone, cluster, ring or sentinel (default: standalone)
    /// - `REDIS_ADDRS`: comma separated addresses (default: "redis://localhost:6379")
    /// - `REDIS_USERNAME` / `REDIS_PASSWORD`: optional credentials
    /// - `REDIS_DB`: database index (default: 0)
    /// - `REDIS_MASTER_NAME`: primary name, required for sentinel
    pub fn from_env() -> StoreResult<Self> {
        let topology = match std::env::var("REDIS_TOPOLOGY") {
            Ok(value) => value.parse()?,
            Err(_) => Topology::Standalone,
        };

        let addrs = std::env::var("REDIS_ADDRS")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string())
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(str::to_string)
            .collect();

        let db = std::env::var("REDIS_DB")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        Ok(RedisConfig {
            topology,
            addrs,
            username: std::env::var("REDIS_USERNAME").ok().filter(|s| !s.is_empty()),
            password: std::env::var("REDIS_PASSWORD").ok().filter(|s| !s.is_empty()),
            db,
            master_name: std::env::var("REDIS_MASTER_NAME").ok().filter(|s| !s.is_empty()),
        })
    }

    /// Connection info for one node, with this config's credentials and database
    pub fn connection_info(&self, addr: &str) -> StoreResult<ConnectionInfo> {
        let mut info = parse_addr(addr)?;
        if self.username.is_some() {
            info.redis.username = self.username.clone();
        }
        if self.password.is_some() {
            info.redis.password = self.password.clone();
        }
        info.redis.db = self.db;
        Ok(info)
    }

    /// Connection info for a node discovered at runtime
    pub fn tcp_info(&self, host: impl Into<String>, port: u16) -> ConnectionInfo {
        let mut info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(host.into(), port),
            redis: Default::default(),
        };
        info.redis.username = self.username.clone();
        info.redis.password = self.password.clone();
        info.redis.db = self.db;
        info
    }

    /// Ring shards as `(name, address)` pairs
    pub fn shards(&self) -> Vec<(String, String)> {
        self.addrs
            .iter()
            .map(|entry| match entry.split_once('=') {
                Some((name, addr)) => (name.trim().to_string(), addr.trim().to_string()),
                None => (entry.clone(), entry.clone()),
            })
            .collect()
    }

    /// Cluster client seeded with every configured address
    pub fn cluster_client(&self) -> StoreResult<ClusterClient> {
        self.require_addrs()?;
        let nodes = self
            .addrs
            .iter()
            .map(|addr| parse_addr(addr))
            .collect::<StoreResult<Vec<_>>>()?;

        let mut builder = ClusterClientBuilder::new(nodes);
        if let Some(username) = &self.username {
            builder = builder.username(username.clone());
        }
        if let Some(password) = &self.password {
            builder = builder.password(password.clone());
        }
        Ok(builder.build()?)
    }

    pub fn require_addrs(&self) -> StoreResult<()> {
        if self.addrs.is_empty() {
            return Err(StoreError::Configuration(
                "at least one Redis address is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse `host:port` or a `redis://` URL into connection info
pub fn parse_addr(addr: &str) -> StoreResult<ConnectionInfo> {
    if addr.contains("://") {
        return Ok(addr.into_connection_info()?);
    }
    let (host, port) = match addr.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|e| {
                StoreError::Configuration(format!("invalid port in address {}: {}", addr, e))
            })?;
            (host.to_string(), port)
        }
        None => (addr.to_string(), 6379),
    };
    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host, port),
        redis: Default::default(),
    })
}
