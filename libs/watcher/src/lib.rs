//! Consistency watcher for token stores
//!
//! Nodes that do not share one physical store keep each other in sync by
//! publishing a mutation envelope for every local write on a shared Redis
//! channel. Each node subscribes to the channel and replays what its peers
//! published through an update callback, usually
//! [`default_update_callback`] bound to its own adapter.

pub mod callback;
pub mod error;
pub mod msg;
pub mod options;
pub mod synced;
pub mod transport;
pub mod watcher;

pub use callback::{UpdateCallback, apply, default_update_callback};
pub use error::{WatcherError, WatcherResult};
pub use msg::{Msg, Mutation, UpdateType};
pub use options::{DEFAULT_CHANNEL, WatcherOptions};
pub use synced::SyncedAdapter;
pub use transport::{LocalBus, Publisher, RedisPublisher, RedisSubscriber, Subscriber};
pub use watcher::{Watcher, WatcherState};
