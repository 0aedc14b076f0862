//! Roster scenarios driven end to end through the zone actor.

use nocturne_protocol::envelope::{Envelope, EnvelopeKind, MoveMethod, PlayerMove};
use nocturne_protocol::types::Position;
use nocturne_protocol::{ProximityRosterDelta, RangeBand};
use pretty_assertions::assert_eq;

use super::harness::TestWorld;

fn delta_from(data: &serde_json::Value) -> ProximityRosterDelta {
    serde_json::from_value(data.clone()).unwrap()
}

#[tokio::test]
async fn joining_player_appears_in_observer_deltas() {
    let mut world = TestWorld::new().await;

    let (_a_id, a_socket) = world.join("A", [0.0, 0.0, 0.0]).await;
    world.drain_output();

    let (b_id, b_socket) = world.join("B", [5.0, 0.0, 0.0]).await;
    let messages = world.drain_output();

    // A sees B arrive on the say band: bearing 90 (due east), level, 5 m.
    let deltas = TestWorld::events_for(&messages, a_socket, "proximity_roster_delta");
    assert_eq!(deltas.len(), 1);

    let delta = delta_from(&deltas[0]);
    let say = &delta.channels[&RangeBand::Say];
    assert_eq!(say.added.len(), 1);
    assert_eq!(say.added[0].id, b_id);
    assert_eq!(say.added[0].bearing, 90);
    assert_eq!(say.added[0].elevation, 0);
    assert_eq!(say.added[0].range, 5.0);
    assert_eq!(say.count, Some(1));
    assert_eq!(say.sample, Some(Some(vec!["B".to_owned()])));
    assert!(!delta.channels.contains_key(&RangeBand::Touch));

    // B's first delta is the whole roster, every band present.
    let deltas = TestWorld::events_for(&messages, b_socket, "proximity_roster_delta");
    assert_eq!(deltas.len(), 1);

    let delta = delta_from(&deltas[0]);
    assert_eq!(delta.channels.len(), 7);
    assert_eq!(delta.danger_state, Some(false));
    assert_eq!(delta.channels[&RangeBand::Say].added.len(), 1);
}

#[tokio::test]
async fn moving_out_of_a_band_removes_and_reranges() {
    let mut world = TestWorld::new().await;

    let (_a_id, a_socket) = world.join("A", [0.0, 0.0, 0.0]).await;
    let (b_id, _b_socket) = world.join("B", [5.0, 0.0, 0.0]).await;
    world.drain_output();

    world
        .actor
        .handle_envelope(Envelope::new(EnvelopeKind::PlayerMove(PlayerMove {
            character_id: b_id.clone(),
            method: MoveMethod::Position,
            position: Some(Position::new(7.0, 0.0, 0.0)),
            heading: None,
            speed: None,
        })))
        .await;

    let messages = world.drain_output();
    let deltas = TestWorld::events_for(&messages, a_socket, "proximity_roster_delta");
    assert_eq!(deltas.len(), 1);

    let delta = delta_from(&deltas[0]);

    let say = &delta.channels[&RangeBand::Say];
    assert_eq!(say.removed, vec![b_id.clone()]);
    assert_eq!(say.count, Some(0));
    assert_eq!(say.sample, Some(None));

    let shout = &delta.channels[&RangeBand::Shout];
    assert_eq!(shout.updated.len(), 1);
    assert_eq!(shout.updated[0].id, b_id);
    assert_eq!(shout.updated[0].range, Some(7.0));
    assert_eq!(shout.updated[0].bearing, None);
}

#[tokio::test]
async fn unchanged_world_sends_no_deltas() {
    let mut world = TestWorld::new().await;

    let (a_id, _a_socket) = world.join("A", [0.0, 0.0, 0.0]).await;
    let (_b_id, _b_socket) = world.join("B", [5.0, 0.0, 0.0]).await;
    world.drain_output();

    // A position "update" to the same place recomputes every roster but
    // nothing changed, so nothing is published.
    world
        .actor
        .handle_envelope(Envelope::new(EnvelopeKind::PlayerMove(PlayerMove {
            character_id: a_id,
            method: MoveMethod::Position,
            position: Some(Position::new(0.0, 0.0, 0.0)),
            heading: None,
            speed: None,
        })))
        .await;

    let messages = world.drain_output();
    assert!(
        messages
            .iter()
            .all(|message| message.event != "proximity_roster_delta"),
        "expected roster silence"
    );
}

#[tokio::test]
async fn chat_records_last_speaker_in_rosters() {
    use nocturne_protocol::envelope::{ChatChannel, PlayerChat};

    let mut world = TestWorld::new().await;

    let (a_id, _a_socket) = world.join("A", [0.0, 0.0, 0.0]).await;
    let (_b_id, b_socket) = world.join("B", [5.0, 0.0, 0.0]).await;
    world.drain_output();

    world
        .actor
        .handle_envelope(Envelope::new(EnvelopeKind::PlayerChat(PlayerChat {
            character_id: a_id,
            channel: ChatChannel::Say,
            message: "hail, stranger".to_owned(),
            target: None,
        })))
        .await;

    let messages = world.drain_output();

    // Both hear the chat; B's roster now names A as the last speaker.
    let chats = TestWorld::events_for(&messages, b_socket, "chat");
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0]["message"], "hail, stranger");
    assert_eq!(chats[0]["from"], "A");

    let deltas = TestWorld::events_for(&messages, b_socket, "proximity_roster_delta");
    assert_eq!(deltas.len(), 1);
    let delta = delta_from(&deltas[0]);
    assert_eq!(
        delta.channels[&RangeBand::Say].last_speaker,
        Some(Some("A".to_owned()))
    );
}
