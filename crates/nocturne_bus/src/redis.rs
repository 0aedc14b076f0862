//! Redis-backed bus for real multi-process clusters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::{BusError, BusMessage, MessageBus, Subscription};

/// A [`MessageBus`] over one Redis deployment.
///
/// Commands run on a shared auto-reconnecting connection; each subscription
/// gets its own pub/sub connection pumped into the returned
/// [`Subscription`] by a background task. A failed publish marks the bus
/// disconnected, logs at `warn`, and drops the message, matching the
/// cluster's fire-and-forget contract.
pub struct RedisBus {
    client: ::redis::Client,
    manager: ::redis::aio::ConnectionManager,
    connected: Arc<AtomicBool>,
}

impl RedisBus {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = ::redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;

        debug!(url, "connected to redis");

        Ok(Self {
            client,
            manager,
            connected: Arc::new(AtomicBool::new(true)),
        })
    }

    fn note_result<T>(&self, result: Result<T, ::redis::RedisError>) -> Result<T, BusError> {
        match result {
            Ok(value) => {
                self.connected.store(true, Ordering::Relaxed);
                Ok(value)
            }
            Err(e) => {
                self.connected.store(false, Ordering::Relaxed);
                Err(BusError::Redis(e))
            }
        }
    }

    async fn spawn_pump(
        &self,
        target: &str,
        pattern: bool,
    ) -> Result<Subscription, BusError> {
        let mut pubsub = self.client.get_async_pubsub().await?;

        if pattern {
            pubsub.psubscribe(target).await?;
        } else {
            pubsub.subscribe(target).await?;
        }

        let (sender, receiver) = flume::unbounded();
        let connected = Arc::clone(&self.connected);
        let target = target.to_owned();

        tokio::spawn(async move {
            let mut stream = pubsub.on_message();

            while let Some(message) = stream.next().await {
                let channel = message.get_channel_name().to_owned();

                let payload: String = match message.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(channel, error = %e, "dropping non-text bus message");
                        continue;
                    }
                };

                if sender.send(BusMessage { channel, payload }).is_err() {
                    // Subscriber dropped its subscription.
                    break;
                }
            }

            connected.store(false, Ordering::Relaxed);
            debug!(target, "pub/sub pump ended");
        });

        Ok(Subscription::new(receiver))
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish(&self, channel: &str, payload: &str) {
        use ::redis::AsyncCommands;

        let mut manager = self.manager.clone();
        let result: Result<i64, _> = manager.publish(channel, payload).await;

        match result {
            Ok(_) => self.connected.store(true, Ordering::Relaxed),
            Err(e) => {
                self.connected.store(false, Ordering::Relaxed);
                warn!(channel, error = %e, "bus disconnected; dropping publish");
            }
        }
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, BusError> {
        self.spawn_pump(channel, false).await
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Subscription, BusError> {
        self.spawn_pump(pattern, true).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BusError> {
        use ::redis::AsyncCommands;

        let mut manager = self.manager.clone();
        self.note_result(manager.get(key).await)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BusError> {
        use ::redis::AsyncCommands;

        let mut manager = self.manager.clone();
        self.note_result(manager.set(key, value).await)
    }

    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), BusError> {
        use ::redis::AsyncCommands;

        let mut manager = self.manager.clone();
        self.note_result(manager.set_ex(key, value, ttl_seconds).await)
    }

    async fn del(&self, key: &str) -> Result<(), BusError> {
        use ::redis::AsyncCommands;

        let mut manager = self.manager.clone();
        let deleted: i64 = self.note_result(manager.del(key).await)?;
        let _ = deleted;

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, BusError> {
        use ::redis::AsyncCommands;

        let mut manager = self.manager.clone();
        self.note_result(manager.exists(key).await)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BusError> {
        use ::redis::AsyncCommands;

        let mut manager = self.manager.clone();
        self.note_result(manager.keys(pattern).await)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
