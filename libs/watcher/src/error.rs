use common::StoreError;
use redis::RedisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Envelope codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Unknown update type: {0}")]
    UnknownMethod(String),

    #[error("Watcher is closed")]
    Closed,

    #[error("Subscriber is already listening")]
    AlreadyListening,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type WatcherResult<T> = Result<T, WatcherError>;
