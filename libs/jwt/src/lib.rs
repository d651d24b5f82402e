//! Credential engine
//!
//! Stateless authentication with self-contained HS256 tokens. The free
//! functions in [`token`] sign and verify claims; [`JwtEngine`] binds them
//! to one configured login type and secret.

pub mod engine;
pub mod error;
pub mod token;

pub use engine::{DEFAULT_DEVICE, DEFAULT_TIMEOUT, JwtConfig, JwtEngine, LoginModel};
pub use error::{JwtError, JwtResult};
pub use token::{TokenClaims, create_token, get_extra_data, get_id, get_timeout, parse_token};
