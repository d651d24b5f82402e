//! Consistency watcher
//!
//! A watcher publishes one envelope per local store mutation on a shared
//! channel and runs a background task that hands every envelope received
//! from peers to the registered callback.

use std::sync::Arc;

use common::StoreValue;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::callback::UpdateCallback;
use crate::error::WatcherResult;
use crate::msg::{Msg, Mutation};
use crate::options::WatcherOptions;
use crate::transport::{self, Publisher, Subscriber};

/// Lifecycle of a watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Not subscribed: not started yet, or the subscription stream ended
    Disconnected,
    Connecting,
    Subscribed,
    Closed,
}

/// Everything guarded by the watcher lock
struct Shared {
    options: WatcherOptions,
    callback: Option<UpdateCallback>,
    publisher: Option<Box<dyn Publisher>>,
    state: WatcherState,
}

struct ReceiveTask {
    close_tx: oneshot::Sender<()>,
    handle: JoinHandle<Box<dyn Subscriber>>,
}

pub struct Watcher {
    shared: Arc<Mutex<Shared>>,
    task: Mutex<Option<ReceiveTask>>,
}

impl Watcher {
    /// Connect to Redis, validate both connections and start listening
    ///
    /// `callback` is registered before the receive loop starts, so no
    /// envelope is received without it.
    pub async fn new(
        options: WatcherOptions,
        callback: Option<UpdateCallback>,
    ) -> WatcherResult<Self> {
        let options = options.normalize();
        info!(
            "Watcher {} connecting to channel {}",
            options.local_id, options.channel
        );
        let (publisher, subscriber) = transport::connect(&options).await?;
        Self::with_clients(options, publisher, subscriber, callback).await
    }

    /// Start a watcher on caller-provided transport clients
    pub async fn with_clients(
        options: WatcherOptions,
        publisher: Box<dyn Publisher>,
        mut subscriber: Box<dyn Subscriber>,
        callback: Option<UpdateCallback>,
    ) -> WatcherResult<Self> {
        let options = options.normalize();
        let channel = options.channel.clone();
        let local_id = options.local_id.clone();
        let shared = Arc::new(Mutex::new(Shared {
            options,
            callback,
            publisher: Some(publisher),
            state: WatcherState::Disconnected,
        }));

        shared.lock().await.state = WatcherState::Connecting;
        subscriber.subscribe(&channel).await?;
        shared.lock().await.state = WatcherState::Subscribed;

        let (close_tx, close_rx) = oneshot::channel();
        let handle = tokio::spawn(receive_loop(shared.clone(), subscriber, close_rx));
        info!("Watcher {} subscribed to channel {}", local_id, channel);

        Ok(Self {
            shared,
            task: Mutex::new(Some(ReceiveTask { close_tx, handle })),
        })
    }

    /// Replace the callback used for envelopes received from now on
    pub async fn set_update_callback(&self, callback: UpdateCallback) {
        self.shared.lock().await.callback = Some(callback);
    }

    pub async fn options(&self) -> WatcherOptions {
        self.shared.lock().await.options.clone()
    }

    pub async fn state(&self) -> WatcherState {
        self.shared.lock().await.state
    }

    pub async fn update_for_set_str(&self, key: &str, value: &str, timeout: i64) {
        let mutation = Mutation::SetStr {
            value: value.to_string(),
            timeout,
        };
        self.publish(key, mutation).await;
    }

    pub async fn update_for_update_str(&self, key: &str, value: &str) {
        let mutation = Mutation::UpdateStr {
            value: value.to_string(),
        };
        self.publish(key, mutation).await;
    }

    /// Publish a set of a session or QR code; raw bytes are not propagated
    pub async fn update_for_set(&self, key: &str, value: &StoreValue, timeout: i64) {
        let mutation = match value {
            StoreValue::Session(session) => Mutation::SetSession {
                value: session.clone(),
                timeout,
            },
            StoreValue::QrCode(code) => Mutation::SetQrCode {
                value: code.clone(),
                timeout,
            },
            StoreValue::Bytes(_) => {
                warn!("Not propagating set of raw bytes for key {}", key);
                return;
            }
        };
        self.publish(key, mutation).await;
    }

    pub async fn update_for_update(&self, key: &str, value: &StoreValue) {
        let mutation = match value {
            StoreValue::Session(session) => Mutation::UpdateSession {
                value: session.clone(),
            },
            StoreValue::QrCode(code) => Mutation::UpdateQrCode {
                value: code.clone(),
            },
            StoreValue::Bytes(_) => {
                warn!("Not propagating update of raw bytes for key {}", key);
                return;
            }
        };
        self.publish(key, mutation).await;
    }

    pub async fn update_for_delete(&self, key: &str) {
        self.publish(key, Mutation::Delete).await;
    }

    pub async fn update_for_update_timeout(&self, key: &str, timeout: i64) {
        self.publish(key, Mutation::UpdateTimeout { timeout }).await;
    }

    /// Publish failures are logged, the local write has already happened
    async fn publish(&self, key: &str, mutation: Mutation) {
        let shared = self.shared.lock().await;
        let msg = Msg::new(shared.options.local_id.as_str(), key, mutation);
        let Some(publisher) = shared.publisher.as_ref() else {
            warn!(
                "Watcher closed, dropping {} for key {}",
                msg.update_type(),
                key
            );
            return;
        };

        let payload = match msg.encode() {
            Ok(payload) => payload,
            Err(err) => {
                error!("Failed to encode {} for key {}: {}", msg.update_type(), key, err);
                return;
            }
        };

        match publisher.publish(&shared.options.channel, payload).await {
            Ok(()) => debug!("Published {} for key {}", msg.update_type(), key),
            Err(err) => error!("Failed to publish {} for key {}: {}", msg.update_type(), key, err),
        }
    }

    /// Stop the receive loop, unsubscribe and release both connections
    ///
    /// Waits for the loop to exit. Closing twice is a no-op.
    pub async fn close(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };
        let _ = task.close_tx.send(());

        let channel = self.shared.lock().await.options.channel.clone();
        match task.handle.await {
            Ok(mut subscriber) => {
                if let Err(err) = subscriber.unsubscribe(&channel).await {
                    warn!("Failed to unsubscribe from {}: {}", channel, err);
                }
            }
            Err(err) => error!("Watcher receive loop failed: {}", err),
        }

        let mut shared = self.shared.lock().await;
        shared.publisher = None;
        shared.state = WatcherState::Closed;
        info!("Watcher {} closed", shared.options.local_id);
    }
}

async fn receive_loop(
    shared: Arc<Mutex<Shared>>,
    mut subscriber: Box<dyn Subscriber>,
    mut close_rx: oneshot::Receiver<()>,
) -> Box<dyn Subscriber> {
    loop {
        tokio::select! {
            biased;
            _ = &mut close_rx => break,
            next = subscriber.next_payload() => match next {
                Some(Ok(payload)) => dispatch(&shared, &payload).await,
                Some(Err(err)) => warn!("Failed to read watcher message: {}", err),
                None => {
                    let mut shared = shared.lock().await;
                    shared.state = WatcherState::Disconnected;
                    error!("Watcher {} subscription ended", shared.options.local_id);
                    break;
                }
            },
        }
    }
    subscriber
}

async fn dispatch(shared: &Mutex<Shared>, payload: &str) {
    let msg = match Msg::decode(payload) {
        Ok(msg) => msg,
        Err(err) => {
            warn!("Failed to parse message {}: {}", payload, err);
            return;
        }
    };

    let callback = {
        let shared = shared.lock().await;
        if shared.options.ignore_self && msg.id == shared.options.local_id {
            return;
        }
        shared.callback.clone()
    };

    debug!("Received {} for key {} from {}", msg.update_type(), msg.key, msg.id);
    match callback {
        Some(callback) => callback(msg).await,
        None => debug!("No update callback registered"),
    }
}
