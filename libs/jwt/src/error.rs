use thiserror::Error;

/// Credential failures, kept distinct so callers can audit the exact cause
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("JWT secret key is not configured")]
    MissingSecret,

    #[error("JWT string cannot be empty")]
    EmptyToken,

    #[error("Invalid signing algorithm: {0}")]
    AlgorithmMismatch(String),

    #[error("Invalid JWT signature")]
    InvalidSignature,

    #[error("JWT parsing failed: {0}")]
    Malformed(String),

    #[error("Invalid JWT login type: expected {expected}, found {found}")]
    LoginTypeMismatch { expected: String, found: String },

    #[error("JWT has expired")]
    Expired,

    #[error("Invalid JWT claim: {0}")]
    InvalidClaim(&'static str),

    #[error("Timeout of {0} seconds is out of range")]
    InvalidTimeout(i64),

    #[error("Failed to generate nonce: {0}")]
    Nonce(String),

    #[error("Failed to sign JWT: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

pub type JwtResult<T> = Result<T, JwtError>;
