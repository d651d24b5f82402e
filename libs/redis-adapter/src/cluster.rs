//! Redis Cluster topology
//!
//! Commands go through the slot-aware cluster connection. Batch deletes
//! discover the current masters from `CLUSTER NODES` and scan each one over
//! a direct connection, since SCAN only walks the node it is sent to.

use async_trait::async_trait;
use common::cache::RedisConfig;
use common::{StoreError, StoreResult};
use redis::aio::MultiplexedConnection;
use redis::cluster_async::ClusterConnection;
use redis::Client;
use tracing::{debug, info};

use crate::adapter::RedisAdapter;
use crate::backend::{Backend, ScanNode};

/// Slot-aware connection to a Redis Cluster
#[derive(Clone)]
pub struct Cluster {
    conn: ClusterConnection,
    config: RedisConfig,
}

impl Cluster {
    pub async fn open(config: &RedisConfig) -> StoreResult<Self> {
        let client = config.cluster_client()?;
        let conn = client.get_async_connection().await?;
        info!(
            "Redis cluster adapter connected through seeds {}",
            config.addrs.join(",")
        );

        Ok(Self {
            conn,
            config: config.clone(),
        })
    }

    async fn master_connection(&self, host: &str, port: u16) -> StoreResult<MultiplexedConnection> {
        let mut info = self.config.tcp_info(host, port);
        info.redis.db = 0;
        let client = Client::open(info)?;
        Ok(client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl Backend for Cluster {
    type Conn = ClusterConnection;

    fn name(&self) -> &'static str {
        "cluster"
    }

    async fn connection(&self, _key: &str) -> StoreResult<Self::Conn> {
        Ok(self.conn.clone())
    }

    async fn scan_nodes(&self) -> StoreResult<Vec<ScanNode>> {
        let mut conn = self.conn.clone();
        let nodes: String = redis::cmd("CLUSTER").arg("NODES").query_async(&mut conn).await?;
        let masters = parse_masters(&nodes);
        if masters.is_empty() {
            return Err(StoreError::Configuration(
                "cluster reported no reachable masters".to_string(),
            ));
        }

        let mut scan_nodes = Vec::with_capacity(masters.len());
        for (host, port) in masters {
            debug!("Scanning cluster master {}:{}", host, port);
            scan_nodes.push(ScanNode::pipelined(
                self.master_connection(&host, port).await?,
            ));
        }
        Ok(scan_nodes)
    }
}

/// Healthy masters listed in a `CLUSTER NODES` reply
///
/// Each line reads `<id> <ip:port@cport[,hostname]> <flags> ...`.
pub fn parse_masters(nodes: &str) -> Vec<(String, u16)> {
    nodes
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _id = fields.next()?;
            let addr = fields.next()?;
            let flags = fields.next()?;

            let flags: Vec<&str> = flags.split(',').collect();
            if !flags.contains(&"master")
                || flags
                    .iter()
                    .any(|f| matches!(*f, "fail" | "fail?" | "noaddr" | "handshake"))
            {
                return None;
            }

            let endpoint = addr.split(['@', ',']).next()?;
            let (host, port) = endpoint.rsplit_once(':')?;
            if host.is_empty() {
                return None;
            }
            Some((host.to_string(), port.parse().ok()?))
        })
        .collect()
}

/// Adapter over a Redis Cluster
pub type ClusterAdapter = RedisAdapter<Cluster>;

impl RedisAdapter<Cluster> {
    pub async fn open(config: &RedisConfig) -> StoreResult<Self> {
        Ok(RedisAdapter::new(Cluster::open(config).await?))
    }
}
