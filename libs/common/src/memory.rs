//! In-process store adapter
//!
//! Entries live in a mutex-guarded map and expire lazily: an expired entry
//! is removed the next time it is touched.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::adapter::{Adapter, NEVER_EXPIRE, NOT_VALUE_EXPIRE, StoreValue, ValueKind, check_key};
use crate::error::StoreResult;
use crate::serializer::{JsonSerializer, Serializer, decode_value, encode_value};

#[derive(Debug)]
struct MemoryEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Store adapter backed by a local map
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    entries: Arc<Mutex<HashMap<String, MemoryEntry>>>,
    serializer: Option<Arc<dyn Serializer>>,
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter {
    /// Create an empty adapter using the JSON serializer
    pub fn new() -> Self {
        Self::with_serializer(Some(Arc::new(JsonSerializer)))
    }

    pub fn with_serializer(serializer: Option<Arc<dyn Serializer>>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            serializer,
        }
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        check_key(key)?;
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
            debug!("Expired key {} removed on read", key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|e| e.data.clone()))
    }

    async fn write(&self, key: &str, data: Vec<u8>, timeout: i64) -> StoreResult<()> {
        check_key(key)?;
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                data,
                expires_at: expiry_from(timeout),
            },
        );
        Ok(())
    }

    async fn overwrite(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        check_key(key)?;
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => entry.data = data,
            Some(_) => {
                entries.remove(key);
            }
            None => {}
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        check_key(key)?;
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        check_key(key)?;
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let timeout = match entries.get(key) {
            None => NOT_VALUE_EXPIRE,
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                NOT_VALUE_EXPIRE
            }
            Some(MemoryEntry {
                expires_at: None, ..
            }) => NEVER_EXPIRE,
            Some(MemoryEntry {
                expires_at: Some(at),
                ..
            }) => at.duration_since(now).as_secs() as i64,
        };
        Ok(timeout)
    }

    async fn expire(&self, key: &str, timeout: i64) -> StoreResult<()> {
        check_key(key)?;
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
            return Ok(());
        }
        if timeout == 0 {
            entries.remove(key);
        } else if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = expiry_from(timeout);
        }
        Ok(())
    }
}

/// Non-positive timeouts never expire
fn expiry_from(timeout: i64) -> Option<Instant> {
    if timeout > 0 {
        Some(Instant::now() + Duration::from_secs(timeout as u64))
    } else {
        None
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn get_str(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self
            .read(key)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn set_str(&self, key: &str, value: &str, timeout: i64) -> StoreResult<()> {
        self.write(key, value.as_bytes().to_vec(), timeout).await
    }

    async fn update_str(&self, key: &str, value: &str) -> StoreResult<()> {
        self.overwrite(key, value.as_bytes().to_vec()).await
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
        match self.read(key).await? {
            Some(bytes) => Ok(Some(decode_value(self.serializer.as_deref(), bytes, kind)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &StoreValue, timeout: i64) -> StoreResult<()> {
        let data = encode_value(self.serializer.as_deref(), value)?;
        self.write(key, data, timeout).await
    }

    async fn update(&self, key: &str, value: &StoreValue) -> StoreResult<()> {
        let data = encode_value(self.serializer.as_deref(), value)?;
        self.overwrite(key, data).await
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
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        debug!(
            "Deleted {} keys matching prefix {}",
            before - entries.len(),
            prefix
        );
        Ok(())
    }
}
