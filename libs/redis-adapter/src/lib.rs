//! Redis-backed store adapter
//!
//! One [`RedisAdapter`] implementation runs over four deployment shapes:
//! a single node, a Redis Cluster, a client-side sharded ring and a
//! sentinel-managed primary. Use [`connect`] to build the one described by
//! a [`RedisConfig`].

pub mod adapter;
pub mod backend;
pub mod cluster;
pub mod ops;
pub mod ring;
pub mod sentinel;
pub mod standalone;

use std::sync::Arc;

use common::cache::{RedisConfig, Topology};
use common::{Adapter, Serializer, StoreResult};
use tracing::info;

pub use adapter::RedisAdapter;
pub use backend::{Backend, ScanNode};
pub use cluster::{Cluster, ClusterAdapter};
pub use ring::{Ring, RingAdapter};
pub use sentinel::{Sentinel, SentinelAdapter};
pub use standalone::{Standalone, StandaloneAdapter};

/// Connect the adapter matching `config.topology`
///
/// `serializer` replaces the default JSON serializer; `None` leaves the
/// adapter able to store raw bytes only.
pub async fn connect(
    config: &RedisConfig,
    serializer: Option<Arc<dyn Serializer>>,
) -> StoreResult<Arc<dyn Adapter>> {
    info!("Connecting {:?} Redis adapter", config.topology);
    let adapter: Arc<dyn Adapter> = match config.topology {
        Topology::Standalone => Arc::new(StandaloneAdapter::open(config).await?.with_serializer(serializer)),
        Topology::Cluster => Arc::new(ClusterAdapter::open(config).await?.with_serializer(serializer)),
        Topology::Ring => Arc::new(RingAdapter::open(config).await?.with_serializer(serializer)),
        Topology::Sentinel => Arc::new(SentinelAdapter::open(config).await?.with_serializer(serializer)),
    };
    Ok(adapter)
}
