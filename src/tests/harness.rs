//! Shared fixture: one zone actor on an in-memory bus with a seeded
//! store, driven deterministically (no spawned tasks, manual ticks).

use std::sync::Arc;

use nocturne_bus::{InMemoryBus, MessageBus, Subscription};
use nocturne_protocol::envelope::{Envelope, EnvelopeKind, PlayerJoinZone};
use nocturne_protocol::types::{CharacterId, Position, SocketId};
use nocturne_protocol::now_millis;
use nocturne_registry::ZoneRegistry;
use nocturne_server::{SilentResponder, ZoneActor};
use nocturne_store::{AbilityDef, Character, MemoryStore, Services, ZoneRecord};
use serde_json::Value;

pub const ZONE_ID: &str = "elysium";

pub struct TestWorld {
    pub store: Arc<MemoryStore>,
    pub actor: ZoneActor,
    output: Subscription,
}

pub struct OutboundMessage {
    pub socket_id: SocketId,
    pub event: String,
    pub data: Value,
}

impl TestWorld {
    pub async fn new() -> Self {
        Self::build(|_| ()).await
    }

    /// Like [`TestWorld::new`], with extra records seeded before the zone
    /// actor loads its residents.
    pub async fn build(seed: impl FnOnce(&MemoryStore)) -> Self {
        let bus = Arc::new(InMemoryBus::new());
        let store = Arc::new(MemoryStore::new());

        store.seed_zone(ZoneRecord {
            id: ZONE_ID.to_owned(),
            name: "Elysium".to_owned(),
            description: "A quiet test ward.".to_owned(),
            content_rating: "general".to_owned(),
            origin: Position::default(),
            size: 1000.0,
        });
        store.seed_ability(AbilityDef::basic_attack());
        seed(&store);

        let services = Services::from_memory(store.clone());
        let registry = Arc::new(ZoneRegistry::new(
            bus.clone() as Arc<dyn MessageBus>,
            "srv-test",
        ));

        let record = services.zones.get(&ZONE_ID.to_owned()).await.unwrap().unwrap();

        let (mut actor, _sender) = ZoneActor::new(
            record,
            bus.clone() as Arc<dyn MessageBus>,
            registry,
            services,
            Arc::new(SilentResponder),
            20.0,
        );
        actor.init_companions().await;

        let output = bus.subscribe("gateway:output").await.unwrap();

        Self {
            store,
            actor,
            output,
        }
    }

    /// Seeds a character and joins it to the zone. Returns its id and
    /// socket handle.
    pub async fn join(&mut self, name: &str, position: [f64; 3]) -> (CharacterId, SocketId) {
        let id = format!("char-{}", name.to_lowercase());
        let socket_id = SocketId::random();
        let now = now_millis();

        self.store.seed_character(Character {
            id: id.clone(),
            account_id: "acct-test".to_owned(),
            name: name.to_owned(),
            level: 1,
            zone_id: ZONE_ID.to_owned(),
            position: Position::new(position[0], position[1], position[2]),
            core_stats: Default::default(),
            resources: Default::default(),
            appearance: None,
            created_at: now,
            last_seen: now,
        });

        self.actor
            .handle_envelope(Envelope::new(EnvelopeKind::PlayerJoinZone(PlayerJoinZone {
                character_id: id.clone(),
                socket_id,
            })))
            .await;

        (id, socket_id)
    }

    /// The character record as the store currently holds it.
    pub async fn store_character(&self, id: &str) -> Character {
        use nocturne_store::CharacterService;

        CharacterService::get(self.store.as_ref(), &id.to_owned())
            .await
            .unwrap()
            .unwrap()
    }

    /// Everything published to `gateway:output` since the last drain.
    pub fn drain_output(&mut self) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();

        while let Some(raw) = self.output.try_next() {
            let envelope = Envelope::from_json(&raw.payload).unwrap();

            let EnvelopeKind::ClientMessage(client_message) = envelope.kind else {
                panic!("non-client message on gateway:output");
            };

            messages.push(OutboundMessage {
                socket_id: client_message.socket_id,
                event: client_message.event,
                data: client_message.data,
            });
        }

        messages
    }

    /// The drained messages addressed to one socket with a given event
    /// name.
    pub fn events_for(
        messages: &[OutboundMessage],
        socket_id: SocketId,
        event: &str,
    ) -> Vec<Value> {
        messages
            .iter()
            .filter(|message| message.socket_id == socket_id && message.event == event)
            .map(|message| message.data.clone())
            .collect()
    }

    /// Event names broadcast to one socket, in publish order.
    pub fn event_names_for(messages: &[OutboundMessage], socket_id: SocketId) -> Vec<String> {
        messages
            .iter()
            .filter(|message| message.socket_id == socket_id)
            .map(|message| message.event.clone())
            .collect()
    }
}
