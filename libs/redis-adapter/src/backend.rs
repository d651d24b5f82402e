//! Connection routing seam between the adapter logic and each topology

use async_trait::async_trait;
use common::StoreResult;
use redis::aio::{ConnectionLike, MultiplexedConnection};
use redis::RedisError;

use crate::ops::{self, BatchDelete};

/// One node that must be scanned during a batch delete
pub struct ScanNode {
    pub conn: MultiplexedConnection,
    pub batch: BatchDelete,
}

impl ScanNode {
    pub fn atomic(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            batch: BatchDelete::Atomic,
        }
    }

    pub fn pipelined(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            batch: BatchDelete::Pipelined,
        }
    }
}

/// How a topology reaches the store
///
/// Implementations own their connections; the clients underneath are safe
/// for concurrent use, so routing hands out cheap clones.
#[async_trait]
pub trait Backend: Send + Sync {
    type Conn: ConnectionLike + Send + 'static;

    /// Topology name used in logs
    fn name(&self) -> &'static str;

    /// Connection owning `key`
    async fn connection(&self, key: &str) -> StoreResult<Self::Conn>;

    /// Every node holding part of the keyspace (each shard or master)
    async fn scan_nodes(&self) -> StoreResult<Vec<ScanNode>>;

    /// Called after a command failed, before the error reaches the caller
    async fn invalidate(&self, _err: &RedisError) {}

    async fn ping(&self) -> StoreResult<bool> {
        let mut conn = self.connection("").await?;
        Ok(ops::ping(&mut conn).await?)
    }
}
