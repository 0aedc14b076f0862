//! Process-local bus used by tests and single-process deployments.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::glob::glob_match;
use crate::{BusError, BusMessage, MessageBus, Subscription};

enum SubscriberKind {
    Exact(String),
    Pattern(String),
}

struct Subscriber {
    kind: SubscriberKind,
    sender: flume::Sender<BusMessage>,
}

impl Subscriber {
    fn matches(&self, channel: &str) -> bool {
        match &self.kind {
            SubscriberKind::Exact(name) => name == channel,
            SubscriberKind::Pattern(pattern) => glob_match(pattern, channel),
        }
    }
}

struct KvEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl KvEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// An in-process [`MessageBus`]. Delivery order per channel follows
/// publication order; TTLs are enforced by purge-on-read.
#[derive(Default)]
pub struct InMemoryBus {
    subscribers: Mutex<Vec<Subscriber>>,
    kv: Mutex<HashMap<String, KvEntry>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_subscriber(&self, kind: SubscriberKind) -> Subscription {
        let (sender, receiver) = flume::unbounded();

        self.subscribers.lock().push(Subscriber { kind, sender });

        Subscription::new(receiver)
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, channel: &str, payload: &str) {
        let mut subscribers = self.subscribers.lock();

        subscribers.retain(|subscriber| {
            if !subscriber.matches(channel) {
                return !subscriber.sender.is_disconnected();
            }

            subscriber
                .sender
                .send(BusMessage {
                    channel: channel.to_owned(),
                    payload: payload.to_owned(),
                })
                .is_ok()
        });
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, BusError> {
        Ok(self.add_subscriber(SubscriberKind::Exact(channel.to_owned())))
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Subscription, BusError> {
        Ok(self.add_subscriber(SubscriberKind::Pattern(pattern.to_owned())))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BusError> {
        let mut kv = self.kv.lock();
        let now = Instant::now();

        if kv.get(key).is_some_and(|entry| entry.is_expired(now)) {
            kv.remove(key);
        }

        Ok(kv.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BusError> {
        self.kv.lock().insert(
            key.to_owned(),
            KvEntry {
                value: value.to_owned(),
                expires_at: None,
            },
        );

        Ok(())
    }

    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), BusError> {
        self.kv.lock().insert(
            key.to_owned(),
            KvEntry {
                value: value.to_owned(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds)),
            },
        );

        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), BusError> {
        self.kv.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, BusError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BusError> {
        let mut kv = self.kv.lock();
        let now = Instant::now();

        kv.retain(|_, entry| !entry.is_expired(now));

        let mut keys: Vec<String> = kv
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        keys.sort();

        Ok(keys)
    }

    fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn publish_reaches_exact_and_pattern_subscribers() {
        let bus = InMemoryBus::new();
        let mut exact = bus.subscribe("zone:z1:input").await.unwrap();
        let mut pattern = bus.psubscribe("zone:*:input").await.unwrap();
        let mut other = bus.subscribe("zone:z2:input").await.unwrap();

        bus.publish("zone:z1:input", "hello").await;

        assert_eq!(exact.next().await.unwrap().payload, "hello");
        assert_eq!(pattern.next().await.unwrap().channel, "zone:z1:input");
        assert!(other.try_next().is_none());
    }

    #[tokio::test]
    async fn per_channel_order_is_publication_order() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("c").await.unwrap();

        for i in 0..10 {
            bus.publish("c", &i.to_string()).await;
        }

        for i in 0..10 {
            assert_eq!(sub.next().await.unwrap().payload, i.to_string());
        }
    }

    #[tokio::test]
    async fn kv_ttl_expires() {
        let bus = InMemoryBus::new();

        bus.set_ex("k", 0, "v").await.unwrap();
        assert_eq!(bus.get("k").await.unwrap(), None);
        assert!(!bus.exists("k").await.unwrap());

        bus.set("k2", "v2").await.unwrap();
        assert_eq!(bus.get("k2").await.unwrap(), Some("v2".to_owned()));
    }

    #[tokio::test]
    async fn keys_scans_by_glob() {
        let bus = InMemoryBus::new();

        bus.set("zone:assignment:a", "1").await.unwrap();
        bus.set("zone:assignment:b", "2").await.unwrap();
        bus.set("player:location:a", "3").await.unwrap();

        let keys = bus.keys("zone:assignment:*").await.unwrap();

        assert_eq!(keys, vec!["zone:assignment:a", "zone:assignment:b"]);
    }
}
