//! Session model and related functionality

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One device's token binding inside a [`Session`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSign {
    /// Token value
    pub value: String,
    /// Client or device identifier
    pub device: String,
}

impl TokenSign {
    pub fn new(value: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            device: device.into(),
        }
    }
}

/// Server-side state of one login identity
///
/// `token_sign_list` holds one entry per live device session and never
/// contains two entries with the same `(value, device)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(rename = "type")]
    pub session_type: String,
    pub login_type: String,
    pub login_id: String,
    pub token: String,
    /// Creation instant in milliseconds since the Unix epoch
    pub create_time: i64,
    #[serde(default)]
    pub data_map: HashMap<String, Value>,
    #[serde(default)]
    pub token_sign_list: Vec<TokenSign>,
}

impl Session {
    /// Create a session stamped with the current time
    pub fn new(
        id: impl Into<String>,
        session_type: impl Into<String>,
        login_type: impl Into<String>,
        login_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            session_type: session_type.into(),
            login_type: login_type.into(),
            login_id: login_id.into(),
            token: token.into(),
            create_time: Utc::now().timestamp_millis(),
            data_map: HashMap::new(),
            token_sign_list: Vec::new(),
        }
    }

    /// Add a token sign, returning `false` if the same binding already exists
    pub fn add_token_sign(&mut self, sign: TokenSign) -> bool {
        if self.token_sign_list.contains(&sign) {
            return false;
        }
        self.token_sign_list.push(sign);
        true
    }

    /// Remove every binding for `value`, returning whether anything was removed
    pub fn remove_token_sign(&mut self, value: &str) -> bool {
        let before = self.token_sign_list.len();
        self.token_sign_list.retain(|sign| sign.value != value);
        before != self.token_sign_list.len()
    }

    /// Most recent binding for `device`
    pub fn token_sign_by_device(&self, device: &str) -> Option<&TokenSign> {
        self.token_sign_list
            .iter()
            .rev()
            .find(|sign| sign.device == device)
    }

    /// Token values bound to `device`, oldest first
    pub fn token_values_by_device(&self, device: &str) -> Vec<&str> {
        self.token_sign_list
            .iter()
            .filter(|sign| sign.device == device)
            .map(|sign| sign.value.as_str())
            .collect()
    }

    pub fn token_sign_count(&self) -> usize {
        self.token_sign_list.len()
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: Value) {
        self.data_map.insert(key.into(), value);
    }

    pub fn get_data(&self, key: &str) -> Option<&Value> {
        self.data_map.get(key)
    }

    pub fn remove_data(&mut self, key: &str) -> Option<Value> {
        self.data_map.remove(key)
    }
}
