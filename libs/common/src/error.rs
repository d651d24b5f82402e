//! Custom error types for the common library
//!
//! This module defines the error types shared by every store adapter
//! implementation and by the pluggable serializers.

use redis::RedisError;
use thiserror::Error;

/// Error raised while converting a stored object to or from bytes
#[derive(Error, Debug)]
pub enum SerializerError {
    /// JSON encoding or decoding failed
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encoding failed
    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding failed
    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
}

/// Custom error type for store adapter operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store rejected the command or could not be reached
    #[error("Store backend error: {0}")]
    Backend(#[from] RedisError),

    /// The value could not be serialized or deserialized
    #[error("Store serialization error: {0}")]
    Serialize(#[from] SerializerError),

    /// An object value was written but no serializer is configured
    #[error("No serializer configured for object value")]
    NoSerializer,

    /// Keys must be non-empty
    #[error("Store key cannot be empty")]
    EmptyKey,

    /// Configuration error
    #[error("Store configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;
