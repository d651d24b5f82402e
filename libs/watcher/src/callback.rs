//! Applying received envelopes to a local adapter

use std::sync::Arc;

use common::{Adapter, StoreResult};
use futures_util::future::BoxFuture;
use tracing::{debug, error};

use crate::msg::{Msg, Mutation};

/// Invoked once per accepted envelope
pub type UpdateCallback = Arc<dyn Fn(Msg) -> BoxFuture<'static, ()> + Send + Sync>;

/// Callback replaying every envelope on `adapter`; failures are logged
///
/// `adapter` must be the plain local store. Binding it to a
/// [`SyncedAdapter`](crate::SyncedAdapter) republishes every replayed
/// envelope under this node's id and peers bounce it back forever; use
/// [`SyncedAdapter::local`](crate::SyncedAdapter::local) instead.
pub fn default_update_callback(adapter: Arc<dyn Adapter>) -> UpdateCallback {
    Arc::new(move |msg: Msg| -> BoxFuture<'static, ()> {
        let adapter = adapter.clone();
        Box::pin(async move {
            if let Err(err) = apply(adapter.as_ref(), &msg).await {
                error!(
                    "Callback update {} for key {} failed: {}",
                    msg.update_type(),
                    msg.key,
                    err
                );
            }
        })
    })
}

/// Run the adapter operation matching the envelope
pub async fn apply(adapter: &dyn Adapter, msg: &Msg) -> StoreResult<()> {
    let key = msg.key.as_str();
    debug!("Applying {} for key {}", msg.update_type(), key);
    match &msg.mutation {
        Mutation::SetStr { value, timeout } => adapter.set_str(key, value, *timeout).await,
        Mutation::UpdateStr { value } => adapter.update_str(key, value).await,
        Mutation::SetSession { value, timeout } => {
            adapter.set(key, &value.clone().into(), *timeout).await
        }
        Mutation::UpdateSession { value } => adapter.update(key, &value.clone().into()).await,
        Mutation::SetQrCode { value, timeout } => {
            adapter.set(key, &value.clone().into(), *timeout).await
        }
        Mutation::UpdateQrCode { value } => adapter.update(key, &value.clone().into()).await,
        Mutation::Delete => adapter.delete(key).await,
        Mutation::UpdateTimeout { timeout } => adapter.update_timeout(key, *timeout).await,
    }
}
