//! Primary-with-failover topology resolved through sentinels
//!
//! The primary address is asked from the sentinels and its connection is
//! cached. A connection or read-only error drops the cached connection so
//! the next call asks the sentinels again and follows a failover.

use async_trait::async_trait;
use common::cache::{RedisConfig, parse_addr};
use common::{StoreError, StoreResult};
use redis::aio::MultiplexedConnection;
use redis::{Client, ConnectionInfo, ErrorKind, RedisError, RedisResult};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::adapter::RedisAdapter;
use crate::backend::{Backend, ScanNode};

/// Sentinel-managed primary
pub struct Sentinel {
    sentinels: Vec<ConnectionInfo>,
    master_name: String,
    config: RedisConfig,
    master: RwLock<Option<MultiplexedConnection>>,
}

impl Sentinel {
    /// Resolve the primary once so a misconfiguration fails at startup
    pub async fn open(config: &RedisConfig) -> StoreResult<Self> {
        config.require_addrs()?;
        let master_name = config.master_name.clone().ok_or_else(|| {
            StoreError::Configuration("sentinel topology requires a master name".to_string())
        })?;
        let sentinels = config
            .addrs
            .iter()
            .map(|addr| parse_addr(addr))
            .collect::<StoreResult<Vec<_>>>()?;

        let sentinel = Self {
            sentinels,
            master_name,
            config: config.clone(),
            master: RwLock::new(None),
        };
        sentinel.connection("").await?;
        Ok(sentinel)
    }

    pub fn master_name(&self) -> &str {
        &self.master_name
    }

    async fn query_master(&self, info: ConnectionInfo) -> RedisResult<Option<(String, u16)>> {
        let client = Client::open(info)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("SENTINEL")
            .arg("get-master-addr-by-name")
            .arg(&self.master_name)
            .query_async(&mut conn)
            .await
    }

    async fn resolve(&self) -> StoreResult<MultiplexedConnection> {
        let mut last_error = None;
        for info in &self.sentinels {
            match self.query_master(info.clone()).await {
                Ok(Some((host, port))) => {
                    let client = Client::open(self.config.tcp_info(host.as_str(), port))?;
                    let conn = client.get_multiplexed_async_connection().await?;
                    info!(
                        "Sentinel {} resolved master {} to {}:{}",
                        info.addr, self.master_name, host, port
                    );
                    return Ok(conn);
                }
                Ok(None) => {
                    warn!(
                        "Sentinel {} does not know master {}",
                        info.addr, self.master_name
                    );
                }
                Err(err) => {
                    warn!("Sentinel {} unreachable: {}", info.addr, err);
                    last_error = Some(err);
                }
            }
        }
        Err(match last_error {
            Some(err) => StoreError::Backend(err),
            None => StoreError::Configuration(format!(
                "no sentinel could resolve master {}",
                self.master_name
            )),
        })
    }
}

/// Errors after which the cached primary may be stale
fn is_failover_error(err: &RedisError) -> bool {
    err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.kind() == ErrorKind::ReadOnly
}

#[async_trait]
impl Backend for Sentinel {
    type Conn = MultiplexedConnection;

    fn name(&self) -> &'static str {
        "sentinel"
    }

    async fn connection(&self, _key: &str) -> StoreResult<Self::Conn> {
        if let Some(conn) = self.master.read().await.as_ref() {
            return Ok(conn.clone());
        }
        let mut master = self.master.write().await;
        if let Some(conn) = master.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.resolve().await?;
        *master = Some(conn.clone());
        Ok(conn)
    }

    async fn scan_nodes(&self) -> StoreResult<Vec<ScanNode>> {
        Ok(vec![ScanNode::atomic(self.connection("").await?)])
    }

    async fn invalidate(&self, err: &RedisError) {
        if is_failover_error(err) {
            warn!(
                "Dropping cached master {} connection after error: {}",
                self.master_name, err
            );
            *self.master.write().await = None;
        }
    }
}

/// Adapter over a sentinel-managed primary
pub type SentinelAdapter = RedisAdapter<Sentinel>;

impl RedisAdapter<Sentinel> {
    pub async fn open(config: &RedisConfig) -> StoreResult<Self> {
        Ok(RedisAdapter::new(Sentinel::open(config).await?))
    }
}
