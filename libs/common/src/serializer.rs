//! Pluggable object serializers
//!
//! A store adapter holds at most one serializer. JSON is the default;
//! MessagePack is available for deployments that prefer a compact encoding.

use std::fmt::Debug;
use std::sync::Arc;

use serde::Deserialize;

use crate::adapter::{StoreValue, ValueKind};
use crate::error::{SerializerError, StoreError, StoreResult};
use crate::model::{QrCode, Session};

/// Strategy converting a stored object to and from an opaque payload
pub trait Serializer: Send + Sync + Debug {
    fn serialize(&self, value: &StoreValue) -> Result<Vec<u8>, SerializerError>;

    fn unserialize(&self, bytes: &[u8], kind: ValueKind) -> Result<StoreValue, SerializerError>;
}

/// Structured text encoding, the default strategy
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &StoreValue) -> Result<Vec<u8>, SerializerError> {
        Ok(match value {
            StoreValue::Bytes(bytes) => bytes.clone(),
            StoreValue::Session(session) => serde_json::to_vec(session)?,
            StoreValue::QrCode(code) => serde_json::to_vec(code)?,
        })
    }

    fn unserialize(&self, bytes: &[u8], kind: ValueKind) -> Result<StoreValue, SerializerError> {
        Ok(match kind {
            ValueKind::Session => StoreValue::Session(serde_json::from_slice::<Session>(bytes)?),
            ValueKind::QrCode => StoreValue::QrCode(serde_json::from_slice::<QrCode>(bytes)?),
        })
    }
}

/// MessagePack encoding with named fields
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackSerializer;

impl Serializer for MsgPackSerializer {
    fn serialize(&self, value: &StoreValue) -> Result<Vec<u8>, SerializerError> {
        Ok(match value {
            StoreValue::Bytes(bytes) => bytes.clone(),
            StoreValue::Session(session) => rmp_serde::to_vec_named(session)?,
            StoreValue::QrCode(code) => rmp_serde::to_vec_named(code)?,
        })
    }

    fn unserialize(&self, bytes: &[u8], kind: ValueKind) -> Result<StoreValue, SerializerError> {
        Ok(match kind {
            ValueKind::Session => StoreValue::Session(rmp_serde::from_slice::<Session>(bytes)?),
            ValueKind::QrCode => StoreValue::QrCode(rmp_serde::from_slice::<QrCode>(bytes)?),
        })
    }
}

/// Serializer selection as it appears in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SerializerKind {
    #[default]
    Json,
    #[serde(alias = "messagepack")]
    MsgPack,
}

impl SerializerKind {
    pub fn build(self) -> Arc<dyn Serializer> {
        match self {
            SerializerKind::Json => Arc::new(JsonSerializer),
            SerializerKind::MsgPack => Arc::new(MsgPackSerializer),
        }
    }
}

/// Encode a value for writing; raw bytes never need a serializer
pub fn encode_value(serializer: Option<&dyn Serializer>, value: &StoreValue) -> StoreResult<Vec<u8>> {
    match (value, serializer) {
        (StoreValue::Bytes(bytes), _) => Ok(bytes.clone()),
        (_, Some(serializer)) => Ok(serializer.serialize(value)?),
        (_, None) => Err(StoreError::NoSerializer),
    }
}

/// Decode a stored payload, passing raw bytes through when no type or serializer is set
pub fn decode_value(
    serializer: Option<&dyn Serializer>,
    bytes: Vec<u8>,
    kind: Option<ValueKind>,
) -> StoreResult<StoreValue> {
    match (serializer, kind) {
        (Some(serializer), Some(kind)) => Ok(serializer.unserialize(&bytes, kind)?),
        _ => Ok(StoreValue::Bytes(bytes)),
    }
}
