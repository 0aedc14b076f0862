//! One client session: the inbound message loop and world-entry flow.

use std::sync::Arc;

use nocturne_bus::MessageBus;
use nocturne_combat::derive_combat_stats;
use nocturne_protocol::envelope::{
    Envelope, EnvelopeKind, MoveMethod, PlayerChat, PlayerCombatAction, PlayerCommand,
    PlayerJoinZone, PlayerLeaveZone, PlayerMove,
};
use nocturne_protocol::event::{
    self, compass_to_heading, AuthError, AuthRequest, AuthSuccess, CharacterCreateRequest,
    CharacterProfile, CharacterSelectRequest, CharacterSummary, ChatRequest, ClientEvent,
    CombatActionRequest, ErrorEvent, HandshakeAck, HandshakeRequest, MoveRequest, NpcSummary,
    PingRequest, PlayerPeekRequest, PlayerPeekResponse, Pong, ServerFrame, Severity,
    WorldEntry, ZoneSummary,
};
use nocturne_protocol::types::{CharacterId, SocketId, ZoneId};
use nocturne_protocol::{is_compatible_version, keys, now_millis, PROTOCOL_VERSION};
use nocturne_registry::ZoneRegistry;
use nocturne_store::{Character, Services, StoreError};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::auth::AuthProvider;
use crate::transport::{Inbound, SocketReader};
use crate::GatewayConfig;

/// Capabilities advertised in `handshake_ack`.
const SERVER_CAPABILITIES: &[&str] = &["chat", "combat", "proximity", "commands"];

/// Per-socket session state and message loop.
pub struct Session {
    socket_id: SocketId,
    config: Arc<GatewayConfig>,
    bus: Arc<dyn MessageBus>,
    registry: Arc<ZoneRegistry>,
    services: Services,
    auth: Arc<dyn AuthProvider>,
    outbound: flume::Sender<ServerFrame>,

    handshaken: bool,
    account_id: Option<String>,
    character_id: Option<CharacterId>,
    current_zone_id: Option<ZoneId>,
    last_ping: i64,
}

impl Session {
    pub fn new(
        socket_id: SocketId,
        config: Arc<GatewayConfig>,
        bus: Arc<dyn MessageBus>,
        registry: Arc<ZoneRegistry>,
        services: Services,
        auth: Arc<dyn AuthProvider>,
        outbound: flume::Sender<ServerFrame>,
    ) -> Self {
        Self {
            socket_id,
            config,
            bus,
            registry,
            services,
            auth,
            outbound,
            handshaken: false,
            account_id: None,
            character_id: None,
            current_zone_id: None,
            last_ping: now_millis(),
        }
    }

    pub fn socket_id(&self) -> SocketId {
        self.socket_id
    }

    /// Drives the session until the client disconnects, then cleans up.
    pub async fn run(mut self, reader: &mut dyn SocketReader) {
        while let Some(inbound) = reader.recv().await {
            let event = match inbound {
                Inbound::Event(event) => event,
                Inbound::Malformed(error) => {
                    self.send_error("bad_frame", &error);
                    continue;
                }
            };

            if matches!(event, ClientEvent::Disconnect) {
                break;
            }

            if self.handle(event).await.is_break() {
                break;
            }
        }

        self.leave_world().await;
        debug!(
            socket_id = %self.socket_id,
            last_ping = self.last_ping,
            "session ended"
        );
    }

    async fn handle(&mut self, event: ClientEvent) -> std::ops::ControlFlow<()> {
        use std::ops::ControlFlow;

        match event {
            ClientEvent::Handshake(request) => return self.on_handshake(request).await,
            ClientEvent::Auth(request) => self.on_auth(request).await,
            ClientEvent::CharacterSelect(request) => self.on_character_select(request).await,
            ClientEvent::CharacterCreate(request) => self.on_character_create(request).await,
            ClientEvent::Move(request) => self.on_move(request).await,
            ClientEvent::Chat(request) => self.on_chat(request).await,
            ClientEvent::CombatAction(request) => self.on_combat_action(request).await,
            ClientEvent::Interact(_) => {
                self.send_error("not_implemented", "interactions are not available yet");
            }
            ClientEvent::Ping(request) => self.on_ping(request),
            ClientEvent::PlayerPeek(request) => self.on_player_peek(request).await,
            ClientEvent::Disconnect => return ControlFlow::Break(()),
        }

        ControlFlow::Continue(())
    }

    async fn on_handshake(&mut self, request: HandshakeRequest) -> std::ops::ControlFlow<()> {
        let compatible = is_compatible_version(&request.version);

        self.send(
            event::HANDSHAKE_ACK,
            &HandshakeAck {
                protocol_version: PROTOCOL_VERSION.to_owned(),
                compatible,
                server_capabilities: SERVER_CAPABILITIES
                    .iter()
                    .map(|&c| c.to_owned())
                    .collect(),
            },
        );

        if !compatible {
            // A short grace so the ack flushes before the close.
            sleep(Duration::from_secs(1)).await;
            return std::ops::ControlFlow::Break(());
        }

        self.handshaken = true;

        std::ops::ControlFlow::Continue(())
    }

    async fn on_auth(&mut self, request: AuthRequest) {
        if !self.handshaken {
            self.send_error("handshake_required", "handshake first");
            return;
        }

        match self.auth.authenticate(&request).await {
            Ok(outcome) => {
                let characters = self
                    .services
                    .characters
                    .find_by_account_id(&outcome.account.id)
                    .await
                    .unwrap_or_default();

                let summaries: Vec<CharacterSummary> = characters
                    .iter()
                    .map(|character| CharacterSummary {
                        id: character.id.clone(),
                        name: character.name.clone(),
                        level: character.level,
                        zone_id: character.zone_id.clone(),
                    })
                    .collect();

                self.account_id = Some(outcome.account.id.clone());

                self.send(
                    event::AUTH_SUCCESS,
                    &AuthSuccess {
                        account_id: outcome.account.id,
                        token: outcome.token,
                        can_create_character: (summaries.len() as u32)
                            < outcome.account.max_characters,
                        max_characters: outcome.account.max_characters,
                        characters: summaries,
                    },
                );
            }
            Err(failure) => {
                self.send(
                    event::AUTH_ERROR,
                    &AuthError {
                        reason: failure.reason,
                        message: failure.message,
                        can_retry: failure.can_retry,
                    },
                );
            }
        }
    }

    async fn on_character_select(&mut self, request: CharacterSelectRequest) {
        let Some(account_id) = self.account_id.clone() else {
            self.send_error("not_authenticated", "authenticate first");
            return;
        };

        let character = match self.services.characters.get(&request.character_id).await {
            Ok(Some(character)) => character,
            Ok(None) => {
                self.send_error("unknown_character", "no such character");
                return;
            }
            Err(e) => {
                self.send_store_error(&e);
                return;
            }
        };

        if character.account_id != account_id {
            warn!(
                socket_id = %self.socket_id,
                character_id = character.id,
                "character select across accounts rejected"
            );
            self.send_error("not_yours", "that character belongs to another account");
            return;
        }

        if let Err(e) = self.services.characters.update_last_seen(&character.id).await {
            debug!(error = %e, "last-seen update failed");
        }

        self.enter_world(character).await;
    }

    async fn on_character_create(&mut self, request: CharacterCreateRequest) {
        let Some(account_id) = self.account_id.clone() else {
            self.send_error("not_authenticated", "authenticate first");
            return;
        };

        let created = self
            .services
            .characters
            .create(
                &account_id,
                request.name.trim(),
                &self.config.starter_zone_id,
                self.config.spawn_position,
                request.appearance,
            )
            .await;

        match created {
            Ok(character) => self.enter_world(character).await,
            Err(StoreError::Duplicate { name, .. }) => {
                self.send_error("name_taken", &format!("{name} already walks these streets"));
            }
            Err(e) => self.send_store_error(&e),
        }
    }

    /// Loads everything the client needs, announces the join to the zone,
    /// and registers the player's location.
    async fn enter_world(&mut self, character: Character) {
        let zone = match self.services.zones.get(&character.zone_id).await {
            Ok(Some(zone)) => zone,
            Ok(None) => {
                self.send_error("unknown_zone", "that zone does not exist");
                return;
            }
            Err(e) => {
                self.send_store_error(&e);
                return;
            }
        };

        let npcs = self
            .services
            .companions
            .find_by_zone_id(&zone.id)
            .await
            .unwrap_or_default();

        let stats = derive_combat_stats(&character.core_stats, character.level);

        self.send(
            event::WORLD_ENTRY,
            &WorldEntry {
                character: CharacterProfile {
                    id: character.id.clone(),
                    name: character.name.clone(),
                    level: character.level,
                    zone_id: character.zone_id.clone(),
                    position: character.position,
                    core_stats: character.core_stats,
                    resources: character.resources,
                },
                stats,
                zone: ZoneSummary {
                    id: zone.id.clone(),
                    name: zone.name,
                    description: zone.description,
                    content_rating: zone.content_rating,
                    origin: zone.origin,
                    size: zone.size,
                },
                npcs: npcs
                    .into_iter()
                    .map(|companion| NpcSummary {
                        id: companion.id,
                        name: companion.name,
                        position: companion.position,
                    })
                    .collect(),
            },
        );

        self.publish_to_zone(
            &zone.id,
            EnvelopeKind::PlayerJoinZone(PlayerJoinZone {
                character_id: character.id.clone(),
                socket_id: self.socket_id,
            }),
            &character.id,
        )
        .await;

        if let Err(e) = self
            .registry
            .update_player_location(&character.id, &zone.id, self.socket_id)
            .await
        {
            warn!(error = %e, "player location update failed");
        }

        info!(
            socket_id = %self.socket_id,
            character = character.name,
            zone_id = zone.id,
            "entered world"
        );

        self.character_id = Some(character.id);
        self.current_zone_id = Some(zone.id);
    }

    async fn on_move(&mut self, request: MoveRequest) {
        let Some((character_id, zone_id)) = self.world_position() else {
            self.send_error("not_in_world", "enter the world first");
            return;
        };

        let heading = request
            .heading
            .or_else(|| request.compass.as_deref().and_then(compass_to_heading));

        match request.method {
            MoveMethod::Position => {
                let Some(position) = request.position else {
                    self.send_error("bad_move", "position moves need a position");
                    return;
                };

                // The store copy updates here; the zone's in-memory copy
                // updates when the envelope lands.
                if let Err(e) = self
                    .services
                    .characters
                    .update_position(&character_id, position)
                    .await
                {
                    debug!(error = %e, "position persist failed");
                }

                if let Err(e) = self
                    .registry
                    .update_player_location(&character_id, &zone_id, self.socket_id)
                    .await
                {
                    debug!(error = %e, "player location refresh failed");
                }

                self.publish_to_zone(
                    &zone_id,
                    EnvelopeKind::PlayerMove(PlayerMove {
                        character_id: character_id.clone(),
                        method: MoveMethod::Position,
                        position: Some(position),
                        heading: None,
                        speed: None,
                    }),
                    &character_id,
                )
                .await;
            }
            MoveMethod::Heading => {
                if heading.is_none() {
                    self.send_error("bad_move", "heading moves need a heading or compass");
                    return;
                }

                self.publish_to_zone(
                    &zone_id,
                    EnvelopeKind::PlayerMove(PlayerMove {
                        character_id: character_id.clone(),
                        method: MoveMethod::Heading,
                        position: None,
                        heading,
                        speed: request.speed,
                    }),
                    &character_id,
                )
                .await;
            }
            MoveMethod::Stop => {
                self.publish_to_zone(
                    &zone_id,
                    EnvelopeKind::PlayerMove(PlayerMove {
                        character_id: character_id.clone(),
                        method: MoveMethod::Stop,
                        position: None,
                        heading: None,
                        speed: None,
                    }),
                    &character_id,
                )
                .await;
            }
        }
    }

    async fn on_chat(&mut self, request: ChatRequest) {
        let Some((character_id, zone_id)) = self.world_position() else {
            self.send_error("not_in_world", "enter the world first");
            return;
        };

        // Slash lines on any chat channel go to the command surface.
        if request.message.starts_with('/') {
            self.publish_to_zone(
                &zone_id,
                EnvelopeKind::PlayerCommand(PlayerCommand {
                    character_id: character_id.clone(),
                    line: request.message,
                }),
                &character_id,
            )
            .await;
            return;
        }

        self.publish_to_zone(
            &zone_id,
            EnvelopeKind::PlayerChat(PlayerChat {
                character_id: character_id.clone(),
                channel: request.channel,
                message: request.message,
                target: request.target,
            }),
            &character_id,
        )
        .await;
    }

    async fn on_combat_action(&mut self, request: CombatActionRequest) {
        let Some((character_id, zone_id)) = self.world_position() else {
            self.send_error("not_in_world", "enter the world first");
            return;
        };

        self.publish_to_zone(
            &zone_id,
            EnvelopeKind::PlayerCombatAction(PlayerCombatAction {
                character_id: character_id.clone(),
                ability_id: request.ability_id,
                target_id: request.target_id,
                position: request.position,
            }),
            &character_id,
        )
        .await;
    }

    fn on_ping(&mut self, request: PingRequest) {
        self.last_ping = now_millis();

        self.send(
            event::PONG,
            &Pong {
                client_timestamp: request.timestamp,
                server_timestamp: self.last_ping,
            },
        );
    }

    async fn on_player_peek(&mut self, request: PlayerPeekRequest) {
        let found = self
            .services
            .characters
            .find_by_name(&request.target_name)
            .await
            .unwrap_or(None);

        let response = match found {
            Some(character) => {
                let location = self
                    .registry
                    .get_player_location(&character.id)
                    .await
                    .unwrap_or(None);

                PlayerPeekResponse {
                    found: true,
                    name: Some(character.name),
                    zone_id: location
                        .map(|l| l.zone_id)
                        .or(Some(character.zone_id)),
                    level: Some(character.level),
                }
            }
            None => PlayerPeekResponse {
                found: false,
                name: None,
                zone_id: None,
                level: None,
            },
        };

        self.send(event::PLAYER_PEEK_RESPONSE, &response);
    }

    /// Announces the leave and clears the registry entry. Runs on explicit
    /// disconnect and on transport drop alike.
    async fn leave_world(&mut self) {
        let Some((character_id, zone_id)) = self.world_position() else {
            return;
        };

        self.publish_to_zone(
            &zone_id,
            EnvelopeKind::PlayerLeaveZone(PlayerLeaveZone {
                character_id: character_id.clone(),
            }),
            &character_id,
        )
        .await;

        if let Err(e) = self.registry.remove_player(&character_id).await {
            debug!(error = %e, "player location removal failed");
        }

        self.character_id = None;
        self.current_zone_id = None;
    }

    fn world_position(&self) -> Option<(CharacterId, ZoneId)> {
        Some((self.character_id.clone()?, self.current_zone_id.clone()?))
    }

    async fn publish_to_zone(
        &self,
        zone_id: &ZoneId,
        kind: EnvelopeKind,
        character_id: &CharacterId,
    ) {
        let envelope = Envelope::new(kind)
            .with_zone(zone_id.clone())
            .with_character(character_id.clone())
            .with_socket(self.socket_id);

        self.bus
            .publish(&keys::zone_input_channel(zone_id), &envelope.to_json())
            .await;
    }

    fn send<T: serde::Serialize>(&self, event: &str, data: &T) {
        let _ = self.outbound.send(ServerFrame::new(event, data));
    }

    fn send_error(&self, code: &str, message: &str) {
        self.send(
            event::ERROR,
            &ErrorEvent {
                code: code.to_owned(),
                message: message.to_owned(),
                severity: Severity::Error,
            },
        );
    }

    fn send_store_error(&self, error: &StoreError) {
        warn!(error = %error, "store failure in session");
        self.send_error("store_error", "something went wrong; try again");
    }
}
