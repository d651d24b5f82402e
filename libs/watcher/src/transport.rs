//! Pub/sub transports the watcher publishes and listens on

use async_trait::async_trait;
use common::cache::RedisConfig;
use common::StoreError;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use redis::aio::{ConnectionLike, MultiplexedConnection, PubSub};
use redis::cluster_async::ClusterConnection;
use redis::Client;
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::{WatcherError, WatcherResult};
use crate::options::WatcherOptions;

/// Sending half of a pub/sub transport
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: String) -> WatcherResult<()>;

    async fn ping(&self) -> WatcherResult<()>;
}

/// Receiving half of a pub/sub transport
#[async_trait]
pub trait Subscriber: Send {
    async fn subscribe(&mut self, channel: &str) -> WatcherResult<()>;

    async fn unsubscribe(&mut self, channel: &str) -> WatcherResult<()>;

    /// Next payload on a subscribed channel, `None` once the stream ended
    ///
    /// Must be safe to drop before completion.
    async fn next_payload(&mut self) -> Option<WatcherResult<String>>;
}

async fn ping_connection<C: ConnectionLike + Send>(conn: &mut C) -> WatcherResult<()> {
    let _: String = redis::cmd("PING").query_async(conn).await?;
    Ok(())
}

/// Publishes through a single node or through a cluster
#[derive(Clone)]
pub enum RedisPublisher {
    Single(MultiplexedConnection),
    Cluster(ClusterConnection),
}

impl RedisPublisher {
    pub async fn connect(config: &RedisConfig, cluster: bool) -> WatcherResult<Self> {
        if cluster {
            let client = config.cluster_client()?;
            Ok(RedisPublisher::Cluster(client.get_async_connection().await?))
        } else {
            let client = Client::open(config.connection_info(first_addr(config)?)?)?;
            Ok(RedisPublisher::Single(
                client.get_multiplexed_async_connection().await?,
            ))
        }
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, channel: &str, payload: String) -> WatcherResult<()> {
        let mut cmd = redis::cmd("PUBLISH");
        cmd.arg(channel).arg(payload);
        let _: i64 = match self {
            RedisPublisher::Single(conn) => cmd.query_async(&mut conn.clone()).await?,
            RedisPublisher::Cluster(conn) => cmd.query_async(&mut conn.clone()).await?,
        };
        Ok(())
    }

    async fn ping(&self) -> WatcherResult<()> {
        match self {
            RedisPublisher::Single(conn) => ping_connection(&mut conn.clone()).await,
            RedisPublisher::Cluster(conn) => ping_connection(&mut conn.clone()).await,
        }
    }
}

/// Subscription on a dedicated pub/sub connection
///
/// Cluster `PUBLISH` reaches every node, so one node is enough to listen on.
/// After `SUBSCRIBE` the connection is turned into a single message stream
/// that lives until unsubscribe, so frames buffered from one read are never
/// dropped between two calls to `next_payload`.
pub struct RedisSubscriber {
    listener: Listener,
}

enum Listener {
    Idle(PubSub),
    Listening(BoxStream<'static, redis::Msg>),
    Released,
}

impl RedisSubscriber {
    pub fn new(pubsub: PubSub) -> Self {
        Self {
            listener: Listener::Idle(pubsub),
        }
    }

    /// Connect to the first address after checking it answers PING
    pub async fn connect(config: &RedisConfig, cluster: bool) -> WatcherResult<Self> {
        let mut info = config.connection_info(first_addr(config)?)?;
        if cluster {
            info.redis.db = 0;
        }
        let client = Client::open(info)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        ping_connection(&mut conn).await?;
        Ok(Self::new(client.get_async_pubsub().await?))
    }
}

#[async_trait]
impl Subscriber for RedisSubscriber {
    /// Only one channel per subscriber; a second call is rejected
    async fn subscribe(&mut self, channel: &str) -> WatcherResult<()> {
        match std::mem::replace(&mut self.listener, Listener::Released) {
            Listener::Idle(mut pubsub) => {
                if let Err(err) = pubsub.subscribe(channel).await {
                    self.listener = Listener::Idle(pubsub);
                    return Err(err.into());
                }
                self.listener = Listener::Listening(pubsub.into_on_message().boxed());
                Ok(())
            }
            Listener::Listening(stream) => {
                self.listener = Listener::Listening(stream);
                Err(WatcherError::AlreadyListening)
            }
            Listener::Released => Err(WatcherError::Closed),
        }
    }

    /// Drops the connection, which ends the subscription on the server
    async fn unsubscribe(&mut self, channel: &str) -> WatcherResult<()> {
        if let Listener::Listening(_) = self.listener {
            info!("Releasing subscription to {}", channel);
        }
        self.listener = Listener::Released;
        Ok(())
    }

    async fn next_payload(&mut self) -> Option<WatcherResult<String>> {
        match &mut self.listener {
            Listener::Listening(stream) => {
                let msg = stream.next().await?;
                Some(msg.get_payload::<String>().map_err(WatcherError::from))
            }
            _ => None,
        }
    }
}

fn first_addr(config: &RedisConfig) -> WatcherResult<&str> {
    config
        .addrs
        .first()
        .map(String::as_str)
        .ok_or_else(|| {
            StoreError::Configuration("watcher requires at least one address".to_string()).into()
        })
}

/// Open and validate both Redis connections described by `options`
pub async fn connect(
    options: &WatcherOptions,
) -> WatcherResult<(Box<dyn Publisher>, Box<dyn Subscriber>)> {
    let config = options.redis_config();
    let publisher = RedisPublisher::connect(&config, options.cluster).await?;
    publisher.ping().await?;
    let subscriber = RedisSubscriber::connect(&config, options.cluster).await?;
    info!(
        "Watcher transport connected to {} ({})",
        config.addrs.join(","),
        if options.cluster { "cluster" } else { "single" }
    );
    Ok((Box::new(publisher), Box::new(subscriber)))
}

/// In-process bus, for watchers sharing one process
#[derive(Clone)]
pub struct LocalBus {
    sender: broadcast::Sender<(String, String)>,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publisher(&self) -> LocalPublisher {
        LocalPublisher {
            sender: self.sender.clone(),
        }
    }

    pub fn subscriber(&self) -> LocalSubscriber {
        LocalSubscriber {
            receiver: self.sender.subscribe(),
            channels: HashSet::new(),
        }
    }
}

#[derive(Clone)]
pub struct LocalPublisher {
    sender: broadcast::Sender<(String, String)>,
}

#[async_trait]
impl Publisher for LocalPublisher {
    async fn publish(&self, channel: &str, payload: String) -> WatcherResult<()> {
        // No receivers is not an error for pub/sub
        let _ = self.sender.send((channel.to_string(), payload));
        Ok(())
    }

    async fn ping(&self) -> WatcherResult<()> {
        Ok(())
    }
}

pub struct LocalSubscriber {
    receiver: broadcast::Receiver<(String, String)>,
    channels: HashSet<String>,
}

#[async_trait]
impl Subscriber for LocalSubscriber {
    async fn subscribe(&mut self, channel: &str) -> WatcherResult<()> {
        self.channels.insert(channel.to_string());
        Ok(())
    }

    async fn unsubscribe(&mut self, channel: &str) -> WatcherResult<()> {
        self.channels.remove(channel);
        Ok(())
    }

    async fn next_payload(&mut self) -> Option<WatcherResult<String>> {
        loop {
            match self.receiver.recv().await {
                Ok((channel, payload)) if self.channels.contains(&channel) => {
                    return Some(Ok(payload));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Local subscriber lagged, {} envelopes skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::net::tcp::OwnedReadHalf;
    use tokio::sync::oneshot;

    fn bulk(value: &str) -> String {
        format!("${}\r\n{}\r\n", value.len(), value)
    }

    fn message_frame(channel: &str, payload: &str) -> String {
        format!("*3\r\n{}{}{}", bulk("message"), bulk(channel), bulk(payload))
    }

    async fn read_command(reader: &mut BufReader<OwnedReadHalf>) -> Option<Vec<String>> {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let count: usize = line.trim_end().strip_prefix('*')?.parse().ok()?;
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            line.clear();
            reader.read_line(&mut line).await.ok()?;
            let len: usize = line.trim_end().strip_prefix('$')?.parse().ok()?;
            let mut buf = vec![0; len + 2];
            reader.read_exact(&mut buf).await.ok()?;
            buf.truncate(len);
            args.push(String::from_utf8(buf).ok()?);
        }
        Some(args)
    }

    /// Single-connection server that confirms SUBSCRIBE, then waits for
    /// `release` and writes every payload in one write
    async fn serve_messages(payloads: Vec<&'static str>) -> (String, oneshot::Sender<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut reader = BufReader::new(read);
            let mut release_rx = Some(release_rx);
            while let Some(args) = read_command(&mut reader).await {
                if args[0].eq_ignore_ascii_case("SUBSCRIBE") {
                    let channel = args[1].clone();
                    let reply = format!("*3\r\n{}{}:1\r\n", bulk("subscribe"), bulk(&channel));
                    write.write_all(reply.as_bytes()).await.unwrap();
                    if let Some(rx) = release_rx.take() {
                        let _ = rx.await;
                    }
                    let frames: String = payloads
                        .iter()
                        .map(|payload| message_frame(&channel, payload))
                        .collect();
                    write.write_all(frames.as_bytes()).await.unwrap();
                } else {
                    write.write_all(b"+OK\r\n").await.unwrap();
                }
            }
        });

        (format!("redis://{}", addr), release_tx)
    }

    async fn subscriber_for(url: &str) -> RedisSubscriber {
        let client = Client::open(url).unwrap();
        RedisSubscriber::new(client.get_async_pubsub().await.unwrap())
    }

    async fn next_within(subscriber: &mut RedisSubscriber) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(2), subscriber.next_payload())
            .await
            .expect("payload before timeout")
            .map(|payload| payload.unwrap())
    }

    #[tokio::test]
    async fn test_messages_from_one_read_are_all_delivered() {
        let (url, release) = serve_messages(vec!["first", "second", "third"]).await;
        let mut subscriber = subscriber_for(&url).await;
        subscriber.subscribe("/token-go").await.unwrap();
        release.send(()).unwrap();

        assert_eq!(next_within(&mut subscriber).await.as_deref(), Some("first"));
        assert_eq!(next_within(&mut subscriber).await.as_deref(), Some("second"));
        assert_eq!(next_within(&mut subscriber).await.as_deref(), Some("third"));
    }

    #[tokio::test]
    async fn test_second_subscribe_is_rejected() {
        let (url, _release) = serve_messages(vec![]).await;
        let mut subscriber = subscriber_for(&url).await;
        subscriber.subscribe("/token-go").await.unwrap();
        assert!(matches!(
            subscriber.subscribe("/other").await,
            Err(WatcherError::AlreadyListening)
        ));
    }

    #[tokio::test]
    async fn test_unsubscribe_ends_stream() {
        let (url, _release) = serve_messages(vec![]).await;
        let mut subscriber = subscriber_for(&url).await;
        subscriber.subscribe("/token-go").await.unwrap();
        subscriber.unsubscribe("/token-go").await.unwrap();
        assert!(subscriber.next_payload().await.is_none());
        assert!(matches!(
            subscriber.subscribe("/token-go").await,
            Err(WatcherError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_local_bus_filters_channels() {
        let bus = LocalBus::default();
        let mut subscriber = bus.subscriber();
        subscriber.subscribe("/token-go").await.unwrap();
        let publisher = bus.publisher();
        publisher.publish("/other", "skip".to_string()).await.unwrap();
        publisher.publish("/token-go", "keep".to_string()).await.unwrap();

        let payload = subscriber.next_payload().await.unwrap().unwrap();
        assert_eq!(payload, "keep");
    }
}
