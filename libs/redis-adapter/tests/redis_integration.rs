//! Integration tests against a live Redis node
//!
//! Run with `cargo test -p redis-adapter -- --ignored` while a server is
//! listening on `REDIS_ADDRS` (default: redis://127.0.0.1:6379).

use common::cache::RedisConfig;
use common::{Adapter, MsgPackSerializer, NEVER_EXPIRE, NOT_VALUE_EXPIRE, QrCode, Session, StoreResult, TokenSign};
use redis_adapter::StandaloneAdapter;
use std::sync::Arc;

fn test_config() -> RedisConfig {
    let addrs = std::env::var("REDIS_ADDRS").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    RedisConfig {
        addrs: vec![addrs],
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_str_operations() -> StoreResult<()> {
    let adapter = StandaloneAdapter::open(&test_config()).await?;
    assert!(adapter.ping().await?);

    adapter.set_str("it:str:k", "v", 30).await?;
    assert_eq!(adapter.get_str("it:str:k").await?, Some("v".to_string()));

    adapter.update_str("it:str:k", "L").await?;
    assert_eq!(adapter.get_str("it:str:k").await?, Some("L".to_string()));
    let timeout = adapter.get_str_timeout("it:str:k").await?;
    assert!((29..=30).contains(&timeout), "update lost the TTL: {}", timeout);

    adapter.update_str_timeout("it:str:k", -1).await?;
    assert_eq!(adapter.get_str_timeout("it:str:k").await?, NEVER_EXPIRE);

    adapter.delete_str("it:str:k").await?;
    assert_eq!(adapter.get_str("it:str:k").await?, None);
    assert_eq!(adapter.get_str_timeout("it:str:k").await?, NOT_VALUE_EXPIRE);

    adapter.update_str("it:str:absent", "v").await?;
    assert_eq!(adapter.get_str("it:str:absent").await?, None);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_session_round_trip() -> StoreResult<()> {
    let adapter = StandaloneAdapter::open(&test_config()).await?;
    let mut session = Session::new("1", "user", "login", "1", "t-mobile");
    session.add_token_sign(TokenSign::new("t-web", "web"));
    session.add_token_sign(TokenSign::new("t-mobile", "mobile"));

    adapter.set("it:session:1", &session.clone().into(), 60).await?;
    let back = adapter.get_session("it:session:1").await?.expect("session stored");
    assert_eq!(back.token_sign_count(), 2);
    assert_eq!(back, session);

    adapter.delete("it:session:1").await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_msgpack_qrcode_expires() -> StoreResult<()> {
    let adapter = StandaloneAdapter::open(&test_config())
        .await?
        .with_serializer(Some(Arc::new(MsgPackSerializer)));
    let qrcode = QrCode::new("q1");

    adapter.set("it:qrcode:q1", &qrcode.into(), 60).await?;
    adapter.update_timeout("it:qrcode:q1", 0).await?;
    assert!(adapter.get("it:qrcode:q1", None).await?.is_none());
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_delete_batch_filtered_key() -> StoreResult<()> {
    let adapter = StandaloneAdapter::open(&test_config()).await?;
    for i in 0..250 {
        adapter.set_str(&format!("it:batch:{}", i), "v", 60).await?;
    }
    adapter.set_str("it:keep:1", "v", 60).await?;

    assert_eq!(adapter.count_filtered_key("it:batch:").await?, 250);
    adapter.delete_batch_filtered_key("it:batch:").await?;
    assert_eq!(adapter.count_filtered_key("it:batch:").await?, 0);
    assert_eq!(adapter.get_str("it:keep:1").await?, Some("v".to_string()));

    adapter.delete_str("it:keep:1").await?;
    Ok(())
}
