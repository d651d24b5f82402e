//! Integration tests for the adapter contract
//!
//! These tests drive the in-process adapter through the `Adapter` trait
//! object, the same way the watcher callback and the sync node use it.

use std::sync::Arc;

use common::{
    Adapter, MemoryAdapter, MsgPackSerializer, NEVER_EXPIRE, QrCode, Session, StoreValue,
    TokenSign, ValueKind,
};
use serde_json::json;

fn shared(adapter: MemoryAdapter) -> Arc<dyn Adapter> {
    Arc::new(adapter)
}

/// A session with two device bindings survives a write and a read
#[tokio::test]
async fn test_two_device_session_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let adapter = shared(MemoryAdapter::new());

    let mut session = Session::new("user:1", "user", "login", "1", "mobile-token");
    session.add_token_sign(TokenSign::new("web-token", "web"));
    session.add_token_sign(TokenSign::new("mobile-token", "mobile"));
    session.set_data("locale", json!("fr"));

    adapter.set("session:1", &StoreValue::Session(session), -1).await?;

    let stored = adapter
        .get_session("session:1")
        .await?
        .expect("session should be stored");
    assert_eq!(stored.token_sign_list.len(), 2, "tokenSignList size");
    assert_eq!(stored.get_data("locale"), Some(&json!("fr")));
    assert_eq!(adapter.get_timeout("session:1").await?, NEVER_EXPIRE);

    Ok(())
}

/// The serializer slot can be swapped without touching adapter logic
#[tokio::test]
async fn test_alternative_serializer() -> Result<(), Box<dyn std::error::Error>> {
    let adapter = shared(MemoryAdapter::with_serializer(Some(Arc::new(MsgPackSerializer))));

    let mut code = QrCode::new("qr-7");
    code.scan("7");
    adapter.set("qr:7", &StoreValue::QrCode(code.clone()), 60).await?;

    let back = adapter.get("qr:7", Some(ValueKind::QrCode)).await?;
    assert_eq!(back, Some(StoreValue::QrCode(code)));

    adapter.update_timeout("qr:7", 0).await?;
    assert_eq!(adapter.get("qr:7", Some(ValueKind::QrCode)).await?, None);

    Ok(())
}
