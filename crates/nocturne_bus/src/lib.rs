#![doc = include_str!("../README.md")]

mod glob;
mod memory;
mod redis;

use async_trait::async_trait;
use thiserror::Error;

pub use self::glob::glob_match;
pub use self::memory::InMemoryBus;
pub use self::redis::RedisBus;

/// Errors surfaced by bus operations. Callers treat every variant as
/// transient: the command is retried at the next tick or superseded by the
/// next input, never escalated into a panic.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus connection failed: {0}")]
    Connection(String),
    #[error("bus is closed")]
    Closed,
    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),
}

/// One message delivered to a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusMessage {
    /// The concrete channel the message was published on (not the
    /// subscription pattern).
    pub channel: String,
    pub payload: String,
}

/// A live subscription. Messages for a single channel arrive in publication
/// order; draining from one task gives the serialized handler execution the
/// zone dispatch loop relies on.
pub struct Subscription {
    receiver: flume::Receiver<BusMessage>,
}

impl Subscription {
    pub(crate) fn new(receiver: flume::Receiver<BusMessage>) -> Self {
        Self { receiver }
    }

    /// Waits for the next message. Returns `None` once the bus side has
    /// gone away.
    pub async fn next(&mut self) -> Option<BusMessage> {
        self.receiver.recv_async().await.ok()
    }

    /// Non-blocking drain, used by tests and tick-interleaved consumers.
    pub fn try_next(&mut self) -> Option<BusMessage> {
        self.receiver.try_recv().ok()
    }
}

/// Channel pub/sub plus a string KV surface with TTLs.
///
/// `publish` is fire-and-forget: a disconnected bus drops the message with
/// a warning rather than surfacing an error to the caller.
#[async_trait]
pub trait MessageBus: Send + Sync + 'static {
    async fn publish(&self, channel: &str, payload: &str);

    async fn subscribe(&self, channel: &str) -> Result<Subscription, BusError>;

    /// Glob pattern subscription, e.g. `zone:*:input`.
    async fn psubscribe(&self, pattern: &str) -> Result<Subscription, BusError>;

    async fn get(&self, key: &str) -> Result<Option<String>, BusError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), BusError>;

    /// `set` with a TTL in seconds.
    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), BusError>;

    async fn del(&self, key: &str) -> Result<(), BusError>;

    async fn exists(&self, key: &str) -> Result<bool, BusError>;

    /// Glob scan over the key space. Readers tolerate staleness; this is
    /// only used for registry queries.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BusError>;

    /// Whether the underlying connection is currently believed healthy.
    fn is_connected(&self) -> bool;
}
