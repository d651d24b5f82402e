//! Single-node topology

use async_trait::async_trait;
use common::cache::RedisConfig;
use common::StoreResult;
use redis::aio::MultiplexedConnection;
use redis::{Client, ConnectionInfo};
use tracing::info;

use crate::adapter::RedisAdapter;
use crate::backend::{Backend, ScanNode};
use crate::ops;

/// One multiplexed connection to a single Redis node
#[derive(Clone)]
pub struct Standalone {
    conn: MultiplexedConnection,
}

impl Standalone {
    /// Connect and verify the node answers PING
    pub async fn connect(info: ConnectionInfo) -> StoreResult<Self> {
        let addr = info.addr.to_string();
        let client = Client::open(info)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        ops::ping(&mut conn).await?;
        info!("Redis standalone adapter connected to {}", addr);
        Ok(Self { conn })
    }

    /// Connect to the first configured address
    pub async fn open(config: &RedisConfig) -> StoreResult<Self> {
        config.require_addrs()?;
        Self::connect(config.connection_info(&config.addrs[0])?).await
    }

    pub fn connection_handle(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

#[async_trait]
impl Backend for Standalone {
    type Conn = MultiplexedConnection;

    fn name(&self) -> &'static str {
        "standalone"
    }

    async fn connection(&self, _key: &str) -> StoreResult<Self::Conn> {
        Ok(self.conn.clone())
    }

    async fn scan_nodes(&self) -> StoreResult<Vec<ScanNode>> {
        Ok(vec![ScanNode::atomic(self.conn.clone())])
    }
}

/// Adapter over a single node
pub type StandaloneAdapter = RedisAdapter<Standalone>;

impl RedisAdapter<Standalone> {
    pub async fn open(config: &RedisConfig) -> StoreResult<Self> {
        Ok(RedisAdapter::new(Standalone::open(config).await?))
    }
}
