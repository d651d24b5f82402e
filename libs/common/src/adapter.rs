//! Uniform key/value contract every store topology implements
//!
//! String operations store UTF-8 text as-is. Object operations go through the
//! adapter's configured [`Serializer`](crate::serializer::Serializer) so a
//! [`Session`] or [`QrCode`] can be written and read back by type.

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::model::{QrCode, Session};

/// The entity has no expiration
pub const NEVER_EXPIRE: i64 = -1;

/// The entity does not exist or has already expired
pub const NOT_VALUE_EXPIRE: i64 = -2;

/// Object payload written through [`Adapter::set`] and read by [`Adapter::get`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    /// Raw bytes, written and read without a serializer
    Bytes(Vec<u8>),
    Session(Session),
    QrCode(QrCode),
}

impl StoreValue {
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            StoreValue::Bytes(_) => None,
            StoreValue::Session(_) => Some(ValueKind::Session),
            StoreValue::QrCode(_) => Some(ValueKind::QrCode),
        }
    }

    pub fn into_session(self) -> Option<Session> {
        match self {
            StoreValue::Session(session) => Some(session),
            _ => None,
        }
    }

    pub fn into_qrcode(self) -> Option<QrCode> {
        match self {
            StoreValue::QrCode(code) => Some(code),
            _ => None,
        }
    }
}

impl From<Session> for StoreValue {
    fn from(session: Session) -> Self {
        StoreValue::Session(session)
    }
}

impl From<QrCode> for StoreValue {
    fn from(code: QrCode) -> Self {
        StoreValue::QrCode(code)
    }
}

/// Target type requested from [`Adapter::get`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Session,
    QrCode,
}

/// Store adapter contract
///
/// Timeouts are in seconds. A negative timeout on any setter means the value
/// never expires. Timeout queries follow the sentinel convention:
/// [`NEVER_EXPIRE`], [`NOT_VALUE_EXPIRE`] or the remaining seconds.
///
/// Read misses return `Ok(None)`; errors are reserved for transport,
/// configuration and serialization failures.
#[async_trait]
pub trait Adapter: Send + Sync {
    async fn get_str(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set_str(&self, key: &str, value: &str, timeout: i64) -> StoreResult<()>;

    /// Overwrite an existing value, keeping its remaining TTL
    async fn update_str(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn delete_str(&self, key: &str) -> StoreResult<()>;

    async fn get_str_timeout(&self, key: &str) -> StoreResult<i64>;

    async fn update_str_timeout(&self, key: &str, timeout: i64) -> StoreResult<()>;

    /// Read an object, decoding it as `kind` when a serializer is configured
    ///
    /// Without a serializer or a requested kind the raw bytes are returned.
    async fn get(&self, key: &str, kind: Option<ValueKind>) -> StoreResult<Option<StoreValue>>;

    async fn set(&self, key: &str, value: &StoreValue, timeout: i64) -> StoreResult<()>;

    async fn update(&self, key: &str, value: &StoreValue) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn get_timeout(&self, key: &str) -> StoreResult<i64>;

    async fn update_timeout(&self, key: &str, timeout: i64) -> StoreResult<()>;

    /// Delete every key starting with `prefix`
    async fn delete_batch_filtered_key(&self, prefix: &str) -> StoreResult<()>;

    async fn get_session(&self, key: &str) -> StoreResult<Option<Session>> {
        Ok(self
            .get(key, Some(ValueKind::Session))
            .await?
            .and_then(StoreValue::into_session))
    }

    /// Check if the backing store is reachable
    async fn ping(&self) -> StoreResult<bool> {
        Ok(true)
    }
}

/// Reject empty keys before any I/O
pub fn check_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::EmptyKey);
    }
    Ok(())
}
