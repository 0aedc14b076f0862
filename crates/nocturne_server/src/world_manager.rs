//! Cross-zone orchestration: zone loading, registration, and envelope
//! routing.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use nocturne_bus::MessageBus;
use nocturne_protocol::envelope::Envelope;
use nocturne_protocol::keys;
use nocturne_protocol::types::ZoneId;
use nocturne_registry::ZoneRegistry;
use nocturne_store::Services;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::npc::NpcResponder;
use crate::zone_actor::{ZoneActor, ZoneMsg};

struct ZoneHandle {
    sender: flume::Sender<ZoneMsg>,
    actor_task: JoinHandle<()>,
    pump_task: JoinHandle<()>,
}

/// Runs every zone assigned to this server.
pub struct WorldManager {
    bus: Arc<dyn MessageBus>,
    registry: Arc<ZoneRegistry>,
    zones: HashMap<ZoneId, ZoneHandle>,
}

impl WorldManager {
    /// Loads the assigned zones (all zones when `assigned` is empty),
    /// spawns an actor per zone, registers ownership, and starts the
    /// heartbeat.
    pub async fn start(
        bus: Arc<dyn MessageBus>,
        registry: Arc<ZoneRegistry>,
        services: Services,
        responder: Arc<dyn NpcResponder>,
        assigned: &[ZoneId],
        host: &str,
        tick_rate: f64,
    ) -> anyhow::Result<Self> {
        let all_zones = services.zones.all().await.context("loading zone records")?;

        let records: Vec<_> = if assigned.is_empty() {
            all_zones
        } else {
            all_zones
                .into_iter()
                .filter(|record| assigned.contains(&record.id))
                .collect()
        };

        anyhow::ensure!(!records.is_empty(), "no zones to run");

        registry.start_heartbeat().await;

        let mut manager = Self {
            bus,
            registry,
            zones: HashMap::new(),
        };

        for record in records {
            manager
                .spawn_zone(record, services.clone(), Arc::clone(&responder), host, tick_rate)
                .await?;
        }

        info!(
            zones = manager.zones.len(),
            server_id = manager.registry.server_id(),
            "world manager running"
        );

        Ok(manager)
    }

    async fn spawn_zone(
        &mut self,
        record: nocturne_store::ZoneRecord,
        services: Services,
        responder: Arc<dyn NpcResponder>,
        host: &str,
        tick_rate: f64,
    ) -> anyhow::Result<()> {
        let zone_id = record.id.clone();

        let (mut actor, sender) = ZoneActor::new(
            record,
            Arc::clone(&self.bus),
            Arc::clone(&self.registry),
            services,
            responder,
            tick_rate,
        );
        actor.init_companions().await;

        self.registry
            .assign_zone(&zone_id, host)
            .await
            .with_context(|| format!("assigning zone {zone_id}"))?;

        let mut subscription = self
            .bus
            .subscribe(&keys::zone_input_channel(&zone_id))
            .await
            .with_context(|| format!("subscribing to zone {zone_id} input"))?;

        // Pump: bus subscription → actor mailbox. Envelope order on the
        // channel is preserved end to end.
        let pump_sender = sender.clone();
        let pump_zone_id = zone_id.clone();
        let pump_task = tokio::spawn(async move {
            while let Some(message) = subscription.next().await {
                let envelope = match Envelope::from_json(&message.payload) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!(
                            zone_id = pump_zone_id,
                            error = %e,
                            "dropping malformed envelope"
                        );
                        continue;
                    }
                };

                if pump_sender.send_async(ZoneMsg::Envelope(envelope)).await.is_err() {
                    break;
                }
            }

            debug!(zone_id = pump_zone_id, "zone input pump ended");
        });

        let actor_task = tokio::spawn(actor.run());

        self.zones.insert(
            zone_id,
            ZoneHandle {
                sender,
                actor_task,
                pump_task,
            },
        );

        Ok(())
    }

    pub fn zone_ids(&self) -> impl Iterator<Item = &ZoneId> {
        self.zones.keys()
    }

    /// Clean shutdown: stop actors, release zone ownership, stop the
    /// heartbeat. Outstanding publishes drain with the actors.
    pub async fn shutdown(self) {
        for (zone_id, handle) in &self.zones {
            let _ = handle.sender.send(ZoneMsg::Shutdown);

            if let Err(e) = self.registry.unassign_zone(zone_id).await {
                warn!(zone_id, error = %e, "zone unassign failed");
            }
        }

        for handle in self.zones.into_values() {
            handle.pump_task.abort();
            let _ = handle.actor_task.await;
        }

        if let Err(e) = self.registry.stop_heartbeat().await {
            warn!(error = %e, "heartbeat stop failed");
        }

        info!("world manager stopped");
    }
}

#[cfg(test)]
mod tests {
    use nocturne_bus::InMemoryBus;
    use nocturne_protocol::envelope::{EnvelopeKind, PlayerJoinZone};
    use nocturne_protocol::types::{Position, SocketId};
    use nocturne_protocol::now_millis;
    use nocturne_store::{AbilityDef, Character, MemoryStore, ZoneRecord};
    use tokio::time::{timeout, Duration};

    use super::*;
    use crate::npc::SilentResponder;

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());

        store.seed_zone(ZoneRecord {
            id: "elysium".to_owned(),
            name: "Elysium".to_owned(),
            description: String::new(),
            content_rating: "general".to_owned(),
            origin: Position::default(),
            size: 500.0,
        });
        store.seed_ability(AbilityDef::basic_attack());

        let now = now_millis();
        store.seed_character(Character {
            id: "char-nyx".to_owned(),
            account_id: "acct".to_owned(),
            name: "Nyx".to_owned(),
            level: 1,
            zone_id: "elysium".to_owned(),
            position: Position::default(),
            core_stats: Default::default(),
            resources: Default::default(),
            appearance: None,
            created_at: now,
            last_seen: now,
        });

        store
    }

    #[tokio::test]
    async fn zones_register_route_and_release() {
        let bus: Arc<dyn MessageBus> = Arc::new(InMemoryBus::new());
        let registry = Arc::new(ZoneRegistry::new(Arc::clone(&bus), "srv-a"));
        let services = Services::from_memory(seeded_store());

        let manager = WorldManager::start(
            Arc::clone(&bus),
            Arc::clone(&registry),
            services,
            Arc::new(SilentResponder),
            &[],
            "127.0.0.1",
            20.0,
        )
        .await
        .unwrap();

        assert_eq!(manager.zone_ids().count(), 1);

        let assignment = registry
            .get_zone_assignment(&"elysium".to_owned())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.server_id, "srv-a");
        assert!(registry.is_server_alive("srv-a").await.unwrap());

        // A join routed over the bus produces the joiner's full roster.
        let mut output = bus.subscribe(keys::GATEWAY_OUTPUT).await.unwrap();

        let join = Envelope::new(EnvelopeKind::PlayerJoinZone(PlayerJoinZone {
            character_id: "char-nyx".to_owned(),
            socket_id: SocketId::random(),
        }))
        .with_zone("elysium");

        bus.publish(&keys::zone_input_channel(&"elysium".to_owned()), &join.to_json())
            .await;

        let message = timeout(Duration::from_secs(2), output.next())
            .await
            .expect("roster delta within deadline")
            .unwrap();
        let envelope = Envelope::from_json(&message.payload).unwrap();
        let EnvelopeKind::ClientMessage(client_message) = envelope.kind else {
            panic!("expected client message");
        };
        assert_eq!(client_message.event, "proximity_roster_delta");

        manager.shutdown().await;

        assert_eq!(
            registry.get_zone_assignment(&"elysium".to_owned()).await.unwrap(),
            None
        );
        assert!(!registry.is_server_alive("srv-a").await.unwrap());
    }

    #[tokio::test]
    async fn assigned_zone_filter_limits_ownership() {
        let bus: Arc<dyn MessageBus> = Arc::new(InMemoryBus::new());
        let registry = Arc::new(ZoneRegistry::new(Arc::clone(&bus), "srv-b"));

        let store = seeded_store();
        store.seed_zone(ZoneRecord {
            id: "umbra".to_owned(),
            name: "Umbra".to_owned(),
            description: String::new(),
            content_rating: "general".to_owned(),
            origin: Position::default(),
            size: 500.0,
        });

        let manager = WorldManager::start(
            Arc::clone(&bus),
            Arc::clone(&registry),
            Services::from_memory(store),
            Arc::new(SilentResponder),
            &["umbra".to_owned()],
            "127.0.0.1",
            20.0,
        )
        .await
        .unwrap();

        assert_eq!(
            manager.zone_ids().map(|z| z.as_str()).collect::<Vec<_>>(),
            vec!["umbra"]
        );
        assert_eq!(
            registry.get_zone_assignment(&"elysium".to_owned()).await.unwrap(),
            None
        );

        manager.shutdown().await;
    }
}
