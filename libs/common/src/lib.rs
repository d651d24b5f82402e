//! Common library for the token-sync workspace
//!
//! This crate provides the pieces shared by every store topology, the
//! consistency watcher and the sync node: the session data model, the
//! expiration sentinels, the store adapter contract, pluggable serializers,
//! Redis connection settings and an in-process adapter.

pub mod adapter;
pub mod cache;
pub mod error;
pub mod memory;
pub mod model;
pub mod serializer;

pub use adapter::{Adapter, NEVER_EXPIRE, NOT_VALUE_EXPIRE, StoreValue, ValueKind};
pub use error::{SerializerError, StoreError, StoreResult};
pub use memory::MemoryAdapter;
pub use model::{QrCode, QrCodeState, Session, TokenSign};
pub use serializer::{JsonSerializer, MsgPackSerializer, Serializer, SerializerKind};
