//! Write-through adapter that announces local mutations to peers

use std::sync::Arc;

use async_trait::async_trait;
use common::{Adapter, StoreResult, StoreValue, ValueKind};

use crate::watcher::Watcher;

/// Wraps a local adapter; every successful mutation is published
///
/// Reads go straight to the local adapter. A failed local write publishes
/// nothing. Batch deletes stay local since no envelope describes them.
///
/// Envelopes received from peers must be replayed on [`Self::local`], not on
/// this adapter, or each replay is published again.
pub struct SyncedAdapter {
    local: Arc<dyn Adapter>,
    watcher: Arc<Watcher>,
}

impl SyncedAdapter {
    pub fn new(local: Arc<dyn Adapter>, watcher: Arc<Watcher>) -> Self {
        Self { local, watcher }
    }

    pub fn local(&self) -> &Arc<dyn Adapter> {
        &self.local
    }

    pub fn watcher(&self) -> &Arc<Watcher> {
        &self.watcher
    }
}

#[async_trait]
impl Adapter for SyncedAdapter {
    async fn get_str(&self, key: &str) -> StoreResult<Option<String>> {
        self.local.get_str(key).await
    }

    async fn set_str(&self, key: &str, value: &str, timeout: i64) -> StoreResult<()> {
        self.local.set_str(key, value, timeout).await?;
        self.watcher.update_for_set_str(key, value, timeout).await;
        Ok(())
    }

    async fn update_str(&self, key: &str, value: &str) -> StoreResult<()> {
        self.local.update_str(key, value).await?;
        self.watcher.update_for_update_str(key, value).await;
        Ok(())
    }

    async fn delete_str(&self, key: &str) -> StoreResult<()> {
        self.local.delete_str(key).await?;
        self.watcher.update_for_delete(key).await;
        Ok(())
    }

    async fn get_str_timeout(&self, key: &str) -> StoreResult<i64> {
        self.local.get_str_timeout(key).await
    }

    async fn update_str_timeout(&self, key: &str, timeout: i64) -> StoreResult<()> {
        self.local.update_str_timeout(key, timeout).await?;
        self.watcher.update_for_update_timeout(key, timeout).await;
        Ok(())
    }

    async fn get(&self, key: &str, kind: Option<ValueKind>) -> StoreResult<Option<StoreValue>> {
        self.local.get(key, kind).await
    }

    async fn set(&self, key: &str, value: &StoreValue, timeout: i64) -> StoreResult<()> {
        self.local.set(key, value, timeout).await?;
        self.watcher.update_for_set(key, value, timeout).await;
        Ok(())
    }

    async fn update(&self, key: &str, value: &StoreValue) -> StoreResult<()> {
        self.local.update(key, value).await?;
        self.watcher.update_for_update(key, value).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.local.delete(key).await?;
        self.watcher.update_for_delete(key).await;
        Ok(())
    }

    async fn get_timeout(&self, key: &str) -> StoreResult<i64> {
        self.local.get_timeout(key).await
    }

    async fn update_timeout(&self, key: &str, timeout: i64) -> StoreResult<()> {
        self.local.update_timeout(key, timeout).await?;
        self.watcher.update_for_update_timeout(key, timeout).await;
        Ok(())
    }

    async fn delete_batch_filtered_key(&self, prefix: &str) -> StoreResult<()> {
        self.local.delete_batch_filtered_key(prefix).await
    }

    async fn ping(&self) -> StoreResult<bool> {
        self.local.ping().await
    }
}
