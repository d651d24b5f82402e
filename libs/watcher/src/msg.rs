//! Mutation envelope and its wire encoding
//!
//! On the wire an envelope is a JSON object with the fields `Method`, `ID`,
//! `K`, `V` and `Timeout`. The shape of `V` depends on `Method`, so decoding
//! reads the method first and only then interprets the payload.

use std::fmt;
use std::str::FromStr;

use common::{QrCode, Session};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{WatcherError, WatcherResult};

/// Wire names of the mutation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    SetStr,
    UpdateStr,
    SetSession,
    UpdateSession,
    SetQrCode,
    UpdateQrCode,
    Delete,
    UpdateTimeout,
}

impl UpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::SetStr => "UpdateForSetStr",
            UpdateType::UpdateStr => "UpdateForUpdateStr",
            UpdateType::SetSession => "UpdateForSetSession",
            UpdateType::UpdateSession => "UpdateForUpdateSession",
            UpdateType::SetQrCode => "UpdateForSetQRCode",
            UpdateType::UpdateQrCode => "UpdateForUpdateQRCode",
            UpdateType::Delete => "UpdateForDelete",
            UpdateType::UpdateTimeout => "UpdateForUpdateTimeout",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateType {
    type Err = WatcherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UpdateForSetStr" => Ok(UpdateType::SetStr),
            "UpdateForUpdateStr" => Ok(UpdateType::UpdateStr),
            "UpdateForSetSession" => Ok(UpdateType::SetSession),
            "UpdateForUpdateSession" => Ok(UpdateType::UpdateSession),
            "UpdateForSetQRCode" => Ok(UpdateType::SetQrCode),
            "UpdateForUpdateQRCode" => Ok(UpdateType::UpdateQrCode),
            "UpdateForDelete" => Ok(UpdateType::Delete),
            "UpdateForUpdateTimeout" => Ok(UpdateType::UpdateTimeout),
            other => Err(WatcherError::UnknownMethod(other.to_string())),
        }
    }
}

/// A store mutation together with its payload
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    SetStr { value: String, timeout: i64 },
    UpdateStr { value: String },
    SetSession { value: Session, timeout: i64 },
    UpdateSession { value: Session },
    SetQrCode { value: QrCode, timeout: i64 },
    UpdateQrCode { value: QrCode },
    Delete,
    UpdateTimeout { timeout: i64 },
}

impl Mutation {
    pub fn update_type(&self) -> UpdateType {
        match self {
            Mutation::SetStr { .. } => UpdateType::SetStr,
            Mutation::UpdateStr { .. } => UpdateType::UpdateStr,
            Mutation::SetSession { .. } => UpdateType::SetSession,
            Mutation::UpdateSession { .. } => UpdateType::UpdateSession,
            Mutation::SetQrCode { .. } => UpdateType::SetQrCode,
            Mutation::UpdateQrCode { .. } => UpdateType::UpdateQrCode,
            Mutation::Delete => UpdateType::Delete,
            Mutation::UpdateTimeout { .. } => UpdateType::UpdateTimeout,
        }
    }

    fn timeout(&self) -> i64 {
        match self {
            Mutation::SetStr { timeout, .. }
            | Mutation::SetSession { timeout, .. }
            | Mutation::SetQrCode { timeout, .. }
            | Mutation::UpdateTimeout { timeout } => *timeout,
            _ => 0,
        }
    }

    fn payload(&self) -> WatcherResult<Value> {
        Ok(match self {
            Mutation::SetStr { value, .. } | Mutation::UpdateStr { value } => {
                Value::String(value.clone())
            }
            Mutation::SetSession { value, .. } | Mutation::UpdateSession { value } => {
                serde_json::to_value(value)?
            }
            Mutation::SetQrCode { value, .. } | Mutation::UpdateQrCode { value } => {
                serde_json::to_value(value)?
            }
            Mutation::Delete | Mutation::UpdateTimeout { .. } => Value::Null,
        })
    }

    fn from_wire(update_type: UpdateType, value: Value, timeout: i64) -> WatcherResult<Self> {
        Ok(match update_type {
            UpdateType::SetStr => Mutation::SetStr {
                value: serde_json::from_value(value)?,
                timeout,
            },
            UpdateType::UpdateStr => Mutation::UpdateStr {
                value: serde_json::from_value(value)?,
            },
            UpdateType::SetSession => Mutation::SetSession {
                value: serde_json::from_value(value)?,
                timeout,
            },
            UpdateType::UpdateSession => Mutation::UpdateSession {
                value: serde_json::from_value(value)?,
            },
            UpdateType::SetQrCode => Mutation::SetQrCode {
                value: serde_json::from_value(value)?,
                timeout,
            },
            UpdateType::UpdateQrCode => Mutation::UpdateQrCode {
                value: serde_json::from_value(value)?,
            },
            UpdateType::Delete => Mutation::Delete,
            UpdateType::UpdateTimeout => Mutation::UpdateTimeout { timeout },
        })
    }
}

/// Mutation envelope published by one node and applied by its peers
#[derive(Debug, Clone, PartialEq)]
pub struct Msg {
    /// Identity of the publishing node
    pub id: String,
    pub key: String,
    pub mutation: Mutation,
}

#[derive(Serialize, Deserialize)]
struct WireMsg {
    #[serde(rename = "Method")]
    method: String,
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "K", default)]
    key: String,
    #[serde(rename = "V", default)]
    value: Value,
    #[serde(rename = "Timeout", default)]
    timeout: i64,
}

impl Msg {
    pub fn new(id: impl Into<String>, key: impl Into<String>, mutation: Mutation) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            mutation,
        }
    }

    pub fn update_type(&self) -> UpdateType {
        self.mutation.update_type()
    }

    pub fn encode(&self) -> WatcherResult<String> {
        let wire = WireMsg {
            method: self.update_type().as_str().to_string(),
            id: self.id.clone(),
            key: self.key.clone(),
            value: self.mutation.payload()?,
            timeout: self.mutation.timeout(),
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Fails with [`WatcherError::UnknownMethod`] before looking at `V` when
    /// the method is not recognized
    pub fn decode(payload: &str) -> WatcherResult<Self> {
        let wire: WireMsg = serde_json::from_str(payload)?;
        let update_type = wire.method.parse::<UpdateType>()?;
        Ok(Self {
            id: wire.id,
            key: wire.key,
            mutation: Mutation::from_wire(update_type, wire.value, wire.timeout)?,
        })
    }
}
