//! Store adapter logic shared by every topology

use std::sync::Arc;

use async_trait::async_trait;
use common::adapter::check_key;
use common::serializer::{decode_value, encode_value};
use common::{Adapter, JsonSerializer, Serializer, StoreResult, StoreValue, ValueKind};
use futures_util::future::join_all;
use redis::RedisResult;
use tracing::{debug, error, info};

use crate::backend::Backend;
use crate::ops;

/// Redis store adapter over one topology
///
/// Holds no lock of its own: every call clones a connection from the
/// backend and runs its commands on it.
pub struct RedisAdapter<B> {
    backend: B,
    serializer: Option<Arc<dyn Serializer>>,
}

impl<B: Backend> RedisAdapter<B> {
    /// Wrap a connected backend, serializing objects as JSON
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            serializer: Some(Arc::new(JsonSerializer)),
        }
    }

    pub fn with_serializer(mut self, serializer: Option<Arc<dyn Serializer>>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn set_serializer(&mut self, serializer: Option<Arc<dyn Serializer>>) {
        self.serializer = serializer;
    }

    /// Underlying topology client
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Count keys starting with `prefix` across every node
    pub async fn count_filtered_key(&self, prefix: &str) -> StoreResult<usize> {
        let nodes = self.backend.scan_nodes().await?;
        let counts = join_all(nodes.into_iter().map(|mut node| async move {
            ops::scan_count(&mut node.conn, prefix).await
        }))
        .await;

        let mut total = 0;
        for count in counts {
            total += self.settle(count).await?;
        }
        Ok(total)
    }

    async fn settle<T: Send>(&self, result: RedisResult<T>) -> StoreResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                self.backend.invalidate(&err).await;
                Err(err.into())
            }
        }
    }

    async fn read_bytes(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        check_key(key)?;
        let mut conn = self.backend.connection(key).await?;
        let result = ops::get::<_, Vec<u8>>(&mut conn, key).await;
        self.settle(result).await
    }

    async fn write_bytes(&self, key: &str, value: &[u8], timeout: i64) -> StoreResult<()> {
        check_key(key)?;
        let mut conn = self.backend.connection(key).await?;
        let result = ops::set(&mut conn, key, value, timeout).await;
        self.settle(result).await
    }

    async fn overwrite_bytes(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        check_key(key)?;
        let mut conn = self.backend.connection(key).await?;
        let result = ops::update(&mut conn, key, value).await;
        self.settle(result).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        check_key(key)?;
        let mut conn = self.backend.connection(key).await?;
        let result = ops::del(&mut conn, key).await;
        self.settle(result).await
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        check_key(key)?;
        let mut conn = self.backend.connection(key).await?;
        let result = ops::ttl(&mut conn, key).await;
        self.settle(result).await
    }

    async fn expire(&self, key: &str, timeout: i64) -> StoreResult<()> {
        check_key(key)?;
        let mut conn = self.backend.connection(key).await?;
        let result = ops::expire(&mut conn, key, timeout).await;
        self.settle(result).await
    }
}

#[async_trait]
impl<B: Backend> Adapter for RedisAdapter<B> {
    async fn get_str(&self, key: &str) -> StoreResult<Option<String>> {
        check_key(key)?;
        let mut conn = self.backend.connection(key).await?;
        let result = ops::get::<_, String>(&mut conn, key).await;
        self.settle(result).await
    }

    async fn set_str(&self, key: &str, value: &str, timeout: i64) -> StoreResult<()> {
        self.write_bytes(key, value.as_bytes(), timeout).await
    }

    async fn update_str(&self, key: &str, value: &str) -> StoreResult<()> {
        self.overwrite_bytes(key, value.as_bytes()).await
    }

    async fn delete_str(&self, key: &str) -> StoreResult<()> {
        self.remove(key).await
    }

    async fn get_str_timeout(&self, key: &str) -> StoreResult<i64> {
        self.ttl(key).await
    }

    async fn update_str_timeout(&self, key: &str, timeout: i64) -> StoreResult<()> {
        self.expire(key, timeout).await
    }

    async fn get(&self, key: &str, kind: Option<ValueKind>) -> StoreResult<Option<StoreValue>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(decode_value(self.serializer.as_deref(), bytes, kind)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &StoreValue, timeout: i64) -> StoreResult<()> {
        let bytes = encode_value(self.serializer.as_deref(), value)?;
        self.write_bytes(key, &bytes, timeout).await
    }

    async fn update(&self, key: &str, value: &StoreValue) -> StoreResult<()> {
        let bytes = encode_value(self.serializer.as_deref(), value)?;
        self.overwrite_bytes(key, &bytes).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.remove(key).await
    }

    async fn get_timeout(&self, key: &str) -> StoreResult<i64> {
        self.ttl(key).await
    }

    async fn update_timeout(&self, key: &str, timeout: i64) -> StoreResult<()> {
        self.expire(key, timeout).await
    }

    async fn delete_batch_filtered_key(&self, prefix: &str) -> StoreResult<()> {
        let nodes = self.backend.scan_nodes().await?;
        let node_count = nodes.len();
        let results = join_all(nodes.into_iter().map(|mut node| async move {
            ops::scan_delete(&mut node.conn, prefix, node.batch).await
        }))
        .await;

        let mut deleted = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(count) => deleted += count,
                Err(err) => {
                    error!(
                        "Batch delete of prefix {} failed on a {} node: {}",
                        prefix,
                        self.backend.name(),
                        err
                    );
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return self.settle(Err(err)).await;
        }

        if deleted > 0 {
            info!(
                "Deleted {} keys with prefix {} across {} {} node(s)",
                deleted,
                prefix,
                node_count,
                self.backend.name()
            );
        } else {
            debug!("No keys with prefix {} to delete", prefix);
        }
        Ok(())
    }

    async fn ping(&self) -> StoreResult<bool> {
        self.backend.ping().await
    }
}
