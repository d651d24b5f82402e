//! Client-side sharded ring topology
//!
//! Keys are spread over independent shards with rendezvous hashing, so every
//! process configured with the same shard names routes a key to the same
//! shard. A `{tag}` inside the key pins related keys to one shard.

use async_trait::async_trait;
use common::cache::RedisConfig;
use common::{StoreError, StoreResult};
use redis::aio::MultiplexedConnection;
use redis::Client;
use tracing::info;
use xxhash_rust::xxh3::{xxh3_64, xxh3_64_with_seed};

use crate::adapter::RedisAdapter;
use crate::backend::{Backend, ScanNode};
use crate::ops;

#[derive(Clone)]
struct Shard {
    name: String,
    conn: MultiplexedConnection,
}

/// Independent shards selected per key
#[derive(Clone)]
pub struct Ring {
    shards: Vec<Shard>,
}

impl Ring {
    pub async fn open(config: &RedisConfig) -> StoreResult<Self> {
        config.require_addrs()?;
        let mut shards = Vec::new();
        for (name, addr) in config.shards() {
            let client = Client::open(config.connection_info(&addr)?)?;
            let mut conn = client.get_multiplexed_async_connection().await?;
            ops::ping(&mut conn).await?;
            info!("Redis ring shard {} connected at {}", name, addr);
            shards.push(Shard { name, conn });
        }
        Ok(Self { shards })
    }

    pub fn shard_names(&self) -> Vec<&str> {
        self.shards.iter().map(|s| s.name.as_str()).collect()
    }

    fn shard_for(&self, key: &str) -> StoreResult<&Shard> {
        let names = self.shard_names();
        pick_shard(&names, key)
            .and_then(|index| self.shards.get(index))
            .ok_or_else(|| StoreError::Configuration("ring has no shards".to_string()))
    }
}

#[async_trait]
impl Backend for Ring {
    type Conn = MultiplexedConnection;

    fn name(&self) -> &'static str {
        "ring"
    }

    async fn connection(&self, key: &str) -> StoreResult<Self::Conn> {
        Ok(self.shard_for(key)?.conn.clone())
    }

    async fn scan_nodes(&self) -> StoreResult<Vec<ScanNode>> {
        Ok(self
            .shards
            .iter()
            .map(|shard| ScanNode::atomic(shard.conn.clone()))
            .collect())
    }

    async fn ping(&self) -> StoreResult<bool> {
        for shard in &self.shards {
            let mut conn = shard.conn.clone();
            if !ops::ping(&mut conn).await? {
                return Ok(false);
            }
        }
        Ok(!self.shards.is_empty())
    }
}

/// Hash tag of a key: the text between the first `{` and the next `}`
pub fn hash_tag(key: &str) -> &str {
    if let Some(start) = key.find('{') {
        if let Some(len) = key[start + 1..].find('}') {
            if len > 0 {
                return &key[start + 1..start + 1 + len];
            }
        }
    }
    key
}

/// Index of the shard owning `key`, highest random weight wins
pub fn pick_shard(names: &[&str], key: &str) -> Option<usize> {
    let tag = hash_tag(key).as_bytes();
    names
        .iter()
        .enumerate()
        .max_by_key(|(_, name)| xxh3_64_with_seed(tag, xxh3_64(name.as_bytes())))
        .map(|(index, _)| index)
}

/// Adapter over a sharded ring
pub type RingAdapter = RedisAdapter<Ring>;

impl RedisAdapter<Ring> {
    pub async fn open(config: &RedisConfig) -> StoreResult<Self> {
        Ok(RedisAdapter::new(Ring::open(config).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_hash_tag() {
        assert_eq!(hash_tag("user:{42}:session"), "42");
        assert_eq!(hash_tag("user:{}:session"), "user:{}:session");
        assert_eq!(hash_tag("plain"), "plain");
        assert_eq!(hash_tag("open{only"), "open{only");
    }

    #[test]
    fn test_pick_shard_is_stable() {
        let names = ["shard-a", "shard-b", "shard-c"];
        for i in 0..100 {
            let key = format!("token:{}", i);
            assert_eq!(pick_shard(&names, &key), pick_shard(&names, &key));
        }
    }

    #[test]
    fn test_pick_shard_spreads_keys() {
        let names = ["shard-a", "shard-b", "shard-c"];
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for i in 0..300 {
            let index = pick_shard(&names, &format!("token:{}", i)).unwrap();
            *counts.entry(index).or_default() += 1;
        }
        assert_eq!(counts.len(), 3, "every shard should own some keys");
    }

    #[test]
    fn test_hash_tag_pins_keys_together() {
        let names = ["shard-a", "shard-b", "shard-c", "shard-d"];
        let first = pick_shard(&names, "session:{user-9}");
        for suffix in ["token", "qrcode", "data"] {
            assert_eq!(pick_shard(&names, &format!("{}:{{user-9}}", suffix)), first);
        }
    }

    #[test]
    fn test_removing_a_shard_only_moves_its_keys() {
        let all = ["shard-a", "shard-b", "shard-c"];
        let remaining = ["shard-a", "shard-c"];
        for i in 0..200 {
            let key = format!("token:{}", i);
            let owner = all[pick_shard(&all, &key).unwrap()];
            if owner != "shard-b" {
                assert_eq!(remaining[pick_shard(&remaining, &key).unwrap()], owner);
            }
        }
    }

    #[test]
    fn test_pick_shard_without_shards() {
        assert_eq!(pick_shard(&[], "key"), None);
    }
}
