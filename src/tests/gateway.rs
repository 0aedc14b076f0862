//! Gateway session flow over the in-process transport.

use std::sync::Arc;

use nocturne_bus::{InMemoryBus, MessageBus};
use nocturne_gateway::{channel, Gateway, GatewayConfig, GuestAuthProvider, Inbound};
use nocturne_protocol::envelope::{ClientMessage, Envelope, EnvelopeKind};
use nocturne_protocol::event::{
    AuthMethod, AuthRequest, CharacterCreateRequest, ClientEvent, HandshakeRequest,
    PingRequest, ServerFrame,
};
use nocturne_protocol::types::{Position, SocketId};
use nocturne_protocol::PROTOCOL_VERSION;
use nocturne_registry::ZoneRegistry;
use nocturne_store::{MemoryStore, Services, ZoneRecord};
use pretty_assertions::assert_eq;
use tokio::time::{timeout, Duration};

const STARTER_ZONE: &str = "haven-square";

struct GatewayFixture {
    gateway: Arc<Gateway>,
    bus: Arc<InMemoryBus>,
}

fn fixture() -> GatewayFixture {
    let bus = Arc::new(InMemoryBus::new());
    let store = Arc::new(MemoryStore::new());

    store.seed_zone(ZoneRecord {
        id: STARTER_ZONE.to_owned(),
        name: "Haven Square".to_owned(),
        description: "The starter ward.".to_owned(),
        content_rating: "general".to_owned(),
        origin: Position::default(),
        size: 500.0,
    });

    let services = Services::from_memory(store);
    let registry = Arc::new(ZoneRegistry::new(
        bus.clone() as Arc<dyn MessageBus>,
        "gw-test",
    ));
    let auth = Arc::new(GuestAuthProvider::new(Arc::clone(&services.accounts)));

    let gateway = Arc::new(Gateway::new(
        GatewayConfig::default(),
        bus.clone() as Arc<dyn MessageBus>,
        registry,
        services,
        auth,
    ));

    GatewayFixture { gateway, bus }
}

async fn next_frame(out_rx: &flume::Receiver<ServerFrame>) -> ServerFrame {
    timeout(Duration::from_secs(2), out_rx.recv_async())
        .await
        .expect("frame within deadline")
        .expect("session still open")
}

#[tokio::test]
async fn handshake_auth_create_and_enter_world() {
    let fixture = fixture();

    let mut zone_input = fixture
        .bus
        .subscribe(&format!("zone:{STARTER_ZONE}:input"))
        .await
        .unwrap();

    let (mut reader, writer, in_tx, out_rx) = channel::pair();

    let gateway = Arc::clone(&fixture.gateway);
    let session = tokio::spawn(async move {
        gateway.drive_session(&mut reader, writer).await;
    });

    in_tx
        .send(Inbound::Event(ClientEvent::Handshake(HandshakeRequest {
            version: PROTOCOL_VERSION.to_owned(),
            client: None,
        })))
        .unwrap();

    let ack = next_frame(&out_rx).await;
    assert_eq!(ack.event, "handshake_ack");
    assert_eq!(ack.data["compatible"], true);

    in_tx
        .send(Inbound::Event(ClientEvent::Auth(AuthRequest {
            method: AuthMethod::Guest,
            username: Some("Nyx".to_owned()),
            password: None,
            token: None,
        })))
        .unwrap();

    let auth = next_frame(&out_rx).await;
    assert_eq!(auth.event, "auth_success");
    assert_eq!(auth.data["canCreateCharacter"], true);
    assert_eq!(auth.data["characters"].as_array().unwrap().len(), 0);

    in_tx
        .send(Inbound::Event(ClientEvent::CharacterCreate(
            CharacterCreateRequest {
                name: "Vesper".to_owned(),
                appearance: None,
            },
        )))
        .unwrap();

    let entry = next_frame(&out_rx).await;
    assert_eq!(entry.event, "world_entry");
    assert_eq!(entry.data["character"]["name"], "Vesper");
    assert_eq!(entry.data["zone"]["id"], STARTER_ZONE);
    assert!(entry.data["stats"]["attackRating"].as_f64().unwrap() > 0.0);

    // The zone was told about the join.
    let join = timeout(Duration::from_secs(2), zone_input.next())
        .await
        .unwrap()
        .unwrap();
    let envelope = Envelope::from_json(&join.payload).unwrap();
    assert!(matches!(
        envelope.kind,
        EnvelopeKind::PlayerJoinZone(ref payload) if !payload.character_id.is_empty()
    ));

    in_tx
        .send(Inbound::Event(ClientEvent::Ping(PingRequest {
            timestamp: 41,
        })))
        .unwrap();

    let pong = next_frame(&out_rx).await;
    assert_eq!(pong.event, "pong");
    assert_eq!(pong.data["clientTimestamp"], 41);

    // Dropping the client ends the session and announces the leave.
    drop(in_tx);
    session.await.unwrap();

    let leave = timeout(Duration::from_secs(2), zone_input.next())
        .await
        .unwrap()
        .unwrap();
    let envelope = Envelope::from_json(&leave.payload).unwrap();
    assert!(matches!(envelope.kind, EnvelopeKind::PlayerLeaveZone(_)));
}

#[tokio::test]
async fn incompatible_handshake_closes_after_ack() {
    let fixture = fixture();
    let (mut reader, writer, in_tx, out_rx) = channel::pair();

    let gateway = Arc::clone(&fixture.gateway);
    let session = tokio::spawn(async move {
        gateway.drive_session(&mut reader, writer).await;
    });

    in_tx
        .send(Inbound::Event(ClientEvent::Handshake(HandshakeRequest {
            version: "99.0.0".to_owned(),
            client: None,
        })))
        .unwrap();

    let ack = next_frame(&out_rx).await;
    assert_eq!(ack.event, "handshake_ack");
    assert_eq!(ack.data["compatible"], false);

    // The server closes its side even though the client stays up.
    timeout(Duration::from_secs(3), session)
        .await
        .expect("session closed")
        .unwrap();
}

#[tokio::test]
async fn output_forwarder_reaches_the_owning_socket_only() {
    let fixture = fixture();
    fixture.gateway.start_output_forwarder().await.unwrap();

    let (mut reader, writer, in_tx, out_rx) = channel::pair();

    let gateway = Arc::clone(&fixture.gateway);
    tokio::spawn(async move {
        gateway.drive_session(&mut reader, writer).await;
    });

    in_tx
        .send(Inbound::Event(ClientEvent::Handshake(HandshakeRequest {
            version: PROTOCOL_VERSION.to_owned(),
            client: None,
        })))
        .unwrap();
    let _ack = next_frame(&out_rx).await;

    // Find the session's socket id through the table.
    let sockets = fixture.gateway.sockets();
    assert_eq!(sockets.len(), 1);

    // A message for some other gateway's socket is dropped silently...
    let stranger = Envelope::new(EnvelopeKind::ClientMessage(ClientMessage::new(
        SocketId::random(),
        "event",
        &serde_json::json!({ "n": 1 }),
    )));
    fixture
        .bus
        .publish("gateway:output", &stranger.to_json())
        .await;

    // ...while unparseable traffic is ignored outright.
    fixture.bus.publish("gateway:output", "not an envelope").await;

    assert!(
        timeout(Duration::from_millis(200), out_rx.recv_async())
            .await
            .is_err(),
        "nothing should reach this client"
    );
}
