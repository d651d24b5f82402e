//! Configured credential engine
//!
//! Binds the token functions to one login type and secret so callers only
//! pass login ids and tokens around.

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{JwtError, JwtResult};
use crate::token::{self, TokenClaims};

/// Default device recorded on a login
pub const DEFAULT_DEVICE: &str = "default-device";

/// Default token lifetime in seconds (30 days)
pub const DEFAULT_TIMEOUT: i64 = 60 * 60 * 24 * 30;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Symmetric signing secret
    pub secret_key: String,
    /// Namespace of the issued tokens
    pub login_type: String,
    /// Token lifetime in seconds, `-1` for tokens that never expire
    pub timeout: i64,
    pub device: String,
}

impl JwtConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            login_type: "user".to_string(),
            timeout: DEFAULT_TIMEOUT,
            device: DEFAULT_DEVICE.to_string(),
        }
    }

    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET_KEY`: Signing secret (required)
    /// - `JWT_LOGIN_TYPE`: Token namespace (default: "user")
    /// - `JWT_TIMEOUT`: Token lifetime in seconds (default: 2592000)
    /// - `JWT_DEVICE`: Default device name (default: "default-device")
    pub fn from_env() -> JwtResult<Self> {
        let secret_key = std::env::var("JWT_SECRET_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(JwtError::MissingSecret)?;

        let timeout = std::env::var("JWT_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT);

        Ok(JwtConfig {
            secret_key,
            login_type: std::env::var("JWT_LOGIN_TYPE").unwrap_or_else(|_| "user".to_string()),
            timeout,
            device: std::env::var("JWT_DEVICE").unwrap_or_else(|_| DEFAULT_DEVICE.to_string()),
        })
    }
}

/// Per-login options
#[derive(Debug, Clone, PartialEq)]
pub struct LoginModel {
    pub device: String,
    pub timeout: i64,
    pub extra_data: Option<Map<String, Value>>,
}

impl Default for LoginModel {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            extra_data: None,
        }
    }
}

impl LoginModel {
    pub fn with_extra_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_data
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Stateless login engine
#[derive(Debug, Clone)]
pub struct JwtEngine {
    config: JwtConfig,
}

impl JwtEngine {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    pub fn login_type(&self) -> &str {
        &self.config.login_type
    }

    pub fn secret_key(&self) -> &str {
        &self.config.secret_key
    }

    pub fn set_secret_key(&mut self, secret_key: impl Into<String>) {
        self.config.secret_key = secret_key.into();
    }

    /// Issue a token with the configured device and timeout
    pub fn login(&self, id: &str) -> JwtResult<String> {
        let model = LoginModel {
            device: self.config.device.clone(),
            timeout: self.config.timeout,
            extra_data: None,
        };
        self.login_with(id, &model)
    }

    pub fn login_with(&self, id: &str, model: &LoginModel) -> JwtResult<String> {
        let token = token::create_token(
            &self.config.login_type,
            id,
            &model.device,
            model.timeout,
            model.extra_data.as_ref(),
            &self.config.secret_key,
        )?;
        info!(
            "Issued {} token for {} on device {}",
            self.config.login_type, id, model.device
        );
        Ok(token)
    }

    pub fn claims_by_token(&self, token: &str) -> JwtResult<TokenClaims> {
        token::parse_token(token, &self.config.login_type, &self.config.secret_key, true)
    }

    pub fn id_by_token(&self, token: &str) -> JwtResult<String> {
        token::get_id(token, &self.config.login_type, &self.config.secret_key)
    }

    pub fn extra_data_by_token(&self, token: &str, key: &str) -> JwtResult<Option<Value>> {
        token::get_extra_data(token, &self.config.login_type, &self.config.secret_key, key)
    }

    pub fn token_timeout(&self, token: &str) -> JwtResult<i64> {
        let timeout = token::get_timeout(token, &self.config.login_type, &self.config.secret_key)?;
        debug!("Token timeout for {} is {}", self.config.login_type, timeout);
        Ok(timeout)
    }
}
