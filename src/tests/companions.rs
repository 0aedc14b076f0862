//! Companion inhabitation and proximity refresh flows.

use nocturne_protocol::envelope::{
    ChatChannel, Envelope, EnvelopeKind, NpcChat, NpcInhabit, NpcRelease,
    PlayerProximityRefresh,
};
use nocturne_protocol::types::{Position, SocketId};
use nocturne_protocol::{ProximityRosterDelta, RangeBand};
use nocturne_store::Companion;
use pretty_assertions::assert_eq;

use super::harness::TestWorld;

const COMPANION_ID: &str = "comp-shade";

async fn world_with_companion() -> TestWorld {
    TestWorld::build(|store| {
        store.seed_companion(Companion {
            id: COMPANION_ID.to_owned(),
            name: "Shade".to_owned(),
            description: "A watcher at the edge of the lamplight.".to_owned(),
            zone_id: super::harness::ZONE_ID.to_owned(),
            position: Position::new(3.0, 0.0, 0.0),
            stats: None,
            resources: Default::default(),
            level: 3,
        });
    })
    .await
}

#[tokio::test]
async fn inhabited_companions_receive_broadcasts() {
    let mut world = world_with_companion().await;

    let (a_id, _a_socket) = world.join("A", [0.0, 0.0, 0.0]).await;
    world.drain_output();

    let controller = SocketId::random();
    world
        .actor
        .handle_envelope(Envelope::new(EnvelopeKind::NpcInhabit(NpcInhabit {
            companion_id: COMPANION_ID.to_owned(),
            socket_id: controller,
        })))
        .await;

    // The controller now gets a roster of its own.
    let messages = world.drain_output();
    let deltas = TestWorld::events_for(&messages, controller, "proximity_roster_delta");
    assert_eq!(deltas.len(), 1);

    // And chat fan-out reaches the inhabited companion.
    world
        .actor
        .handle_envelope(Envelope::new(EnvelopeKind::PlayerChat(
            nocturne_protocol::envelope::PlayerChat {
                character_id: a_id,
                channel: ChatChannel::Say,
                message: "who goes there".to_owned(),
                target: None,
            },
        )))
        .await;

    let messages = world.drain_output();
    let chats = TestWorld::events_for(&messages, controller, "chat");
    assert_eq!(chats.len(), 1);

    // Releasing the companion takes it back out of the broadcast set.
    world
        .actor
        .handle_envelope(Envelope::new(EnvelopeKind::NpcRelease(NpcRelease {
            companion_id: COMPANION_ID.to_owned(),
        })))
        .await;
    world.drain_output();

    world
        .actor
        .handle_envelope(Envelope::new(EnvelopeKind::NpcChat(NpcChat {
            companion_id: COMPANION_ID.to_owned(),
            channel: ChatChannel::Say,
            message: "...".to_owned(),
        })))
        .await;

    let messages = world.drain_output();
    assert!(TestWorld::events_for(&messages, controller, "chat").is_empty());
}

#[tokio::test]
async fn npc_chat_reaches_nearby_players() {
    let mut world = world_with_companion().await;

    let (_a_id, a_socket) = world.join("A", [0.0, 0.0, 0.0]).await;
    world.drain_output();

    world
        .actor
        .handle_envelope(Envelope::new(EnvelopeKind::NpcChat(NpcChat {
            companion_id: COMPANION_ID.to_owned(),
            channel: ChatChannel::Say,
            message: "the square keeps its secrets".to_owned(),
        })))
        .await;

    let messages = world.drain_output();
    let chats = TestWorld::events_for(&messages, a_socket, "chat");
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0]["from"], "Shade");
}

#[tokio::test]
async fn proximity_refresh_resends_the_full_roster() {
    let mut world = world_with_companion().await;

    let (a_id, a_socket) = world.join("A", [0.0, 0.0, 0.0]).await;
    world.drain_output();

    world
        .actor
        .handle_envelope(Envelope::new(EnvelopeKind::PlayerProximityRefresh(
            PlayerProximityRefresh {
                character_id: a_id,
            },
        )))
        .await;

    let messages = world.drain_output();
    let deltas = TestWorld::events_for(&messages, a_socket, "proximity_roster_delta");
    assert_eq!(deltas.len(), 1);

    // A full resend: every channel present, the companion re-added.
    let delta: ProximityRosterDelta = serde_json::from_value(deltas[0].clone()).unwrap();
    assert_eq!(delta.channels.len(), 7);
    assert_eq!(delta.channels[&RangeBand::Say].added.len(), 1);
    assert_eq!(delta.channels[&RangeBand::Say].added[0].name, "Shade");
}
