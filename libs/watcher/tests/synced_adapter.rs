//! Two nodes with separate stores kept in sync over an in-process bus

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use common::{Adapter, MemoryAdapter, NEVER_EXPIRE, Session, StoreResult, TokenSign};
use watcher::{
    LocalBus, Msg, SyncedAdapter, UpdateCallback, Watcher, WatcherOptions, default_update_callback,
};

struct Node {
    store: Arc<dyn Adapter>,
    watcher: Arc<Watcher>,
}

async fn node(bus: &LocalBus, local_id: &str) -> Node {
    let store: Arc<dyn Adapter> = Arc::new(MemoryAdapter::new());
    let options = WatcherOptions {
        local_id: local_id.to_string(),
        ignore_self: true,
        ..Default::default()
    };
    let watcher = Watcher::with_clients(
        options,
        Box::new(bus.publisher()),
        Box::new(bus.subscriber()),
        Some(default_update_callback(store.clone())),
    )
    .await
    .expect("watcher starts");
    Node {
        store,
        watcher: Arc::new(watcher),
    }
}

/// Poll until `check` holds or give up after about a second
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..50 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_writes_propagate_to_peer() -> StoreResult<()> {
    let bus = LocalBus::default();
    let a = node(&bus, "node-a").await;
    let b = node(&bus, "node-b").await;
    let synced = SyncedAdapter::new(a.store.clone(), a.watcher.clone());

    synced.set_str("token:1", "login-1", 60).await?;
    let peer = b.store.clone();
    assert!(
        eventually(|| {
            let peer = peer.clone();
            async move { peer.get_str("token:1").await.ok().flatten().as_deref() == Some("login-1") }
        })
        .await
    );

    let mut session = Session::new("1", "user", "login", "1", "t-mobile");
    session.add_token_sign(TokenSign::new("t-web", "web"));
    session.add_token_sign(TokenSign::new("t-mobile", "mobile"));
    synced.set("session:1", &session.clone().into(), 60).await?;
    assert!(
        eventually(|| {
            let peer = peer.clone();
            async move {
                peer.get_session("session:1")
                    .await
                    .ok()
                    .flatten()
                    .is_some_and(|s| s.token_sign_count() == 2)
            }
        })
        .await
    );

    synced.update_timeout("session:1", -1).await?;
    assert!(
        eventually(|| {
            let peer = peer.clone();
            async move { peer.get_timeout("session:1").await.ok() == Some(NEVER_EXPIRE) }
        })
        .await
    );

    synced.delete_str("token:1").await?;
    assert!(
        eventually(|| {
            let peer = peer.clone();
            async move { matches!(peer.get_str("token:1").await, Ok(None)) }
        })
        .await
    );

    a.watcher.close().await;
    b.watcher.close().await;
    Ok(())
}

#[tokio::test]
async fn test_failed_local_write_publishes_nothing() -> StoreResult<()> {
    let bus = LocalBus::default();
    let a = node(&bus, "node-a").await;
    let b = node(&bus, "node-b").await;

    // Without a serializer the local session write fails
    let bytes_only: Arc<dyn Adapter> = Arc::new(MemoryAdapter::with_serializer(None));
    let synced = SyncedAdapter::new(bytes_only, a.watcher.clone());

    let session = Session::new("2", "user", "login", "2", "t");
    assert!(synced.set("session:2", &session.into(), 60).await.is_err());
    synced.set_str("marker", "m", 60).await?;

    // Envelopes from one publisher arrive in order, so the marker comes last
    let peer = b.store.clone();
    assert!(
        eventually(|| {
            let peer = peer.clone();
            async move { peer.get_str("marker").await.ok().flatten().is_some() }
        })
        .await
    );
    assert!(b.store.get("session:2", None).await?.is_none());

    a.watcher.close().await;
    b.watcher.close().await;
    Ok(())
}

#[tokio::test]
async fn test_replayed_envelope_is_not_republished() -> StoreResult<()> {
    let bus = LocalBus::default();
    let a = node(&bus, "node-a").await;
    let b = node(&bus, "node-b").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let callback: UpdateCallback = Arc::new(move |msg: Msg| -> BoxFuture<'static, ()> {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(msg.id);
        })
    });
    let observer = Watcher::with_clients(
        WatcherOptions {
            local_id: "observer".to_string(),
            ..Default::default()
        },
        Box::new(bus.publisher()),
        Box::new(bus.subscriber()),
        Some(callback),
    )
    .await
    .expect("observer starts");

    // Both nodes write through SyncedAdapter but replay onto their plain stores
    let synced_a = SyncedAdapter::new(a.store.clone(), a.watcher.clone());
    let _synced_b = SyncedAdapter::new(b.store.clone(), b.watcher.clone());
    synced_a.set_str("token:9", "login-9", 60).await?;

    let peer = b.store.clone();
    assert!(
        eventually(|| {
            let peer = peer.clone();
            async move { peer.get_str("token:9").await.ok().flatten().is_some() }
        })
        .await
    );

    let first = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
    assert_eq!(first.ok().flatten().as_deref(), Some("node-a"));
    let echo = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(echo.is_err(), "peer must not republish a replayed envelope");

    observer.close().await;
    a.watcher.close().await;
    b.watcher.close().await;
    Ok(())
}
