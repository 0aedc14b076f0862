//! The per-zone simulation actor.
//!
//! Each zone's entity table is mutated from exactly one task: this actor,
//! fed by the zone's bus input channel and its own fixed-rate ticker.
//! `tokio::select!` serializes the two sources, which is the whole
//! concurrency story for zone state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use nocturne_bus::MessageBus;
use nocturne_combat::{
    derive_combat_stats, AbilityCatalog, CombatManager, RngRolls, RollSource,
};
use nocturne_command::{
    register_builtin_commands, CommandContext, CommandEvent, CommandExecutor, CommandRegistry,
};
use nocturne_math::{step_along, DVec3, FEET_TO_METERS};
use nocturne_protocol::envelope::{
    ChatChannel, ClientMessage, Envelope, EnvelopeKind, MoveMethod, NpcChat, NpcInhabit,
    NpcRelease, PlayerChat, PlayerCombatAction, PlayerCommand, PlayerJoinZone, PlayerLeaveZone,
    PlayerMove, PlayerProximityRefresh, SpeedMode,
};
use nocturne_protocol::event::{
    self, ChatEvent, CombatEndEvent, CommandResponse, ErrorEvent, Severity, StateUpdate,
};
use nocturne_protocol::types::{CombatStats, EntityId, EntityKind, SocketId};
use nocturne_protocol::{keys, now_millis, ProximityRoster};
use nocturne_registry::ZoneRegistry;
use nocturne_store::{Services, ZoneRecord};
use nocturne_world::{Entity, MovementEvent, MovementSystem, MovementTarget, ZoneManager};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::npc::{NpcController, NpcResponder};

/// The observer band combat and chat events fan out over.
pub(crate) const EVENT_BAND_METERS: f64 = 45.72;

/// Walking speed used when no stat block is cached for a mover.
const FALLBACK_BASE_SPEED: f64 = 1.9;

/// Mailbox traffic for one zone actor.
pub enum ZoneMsg {
    Envelope(Envelope),
    Shutdown,
}

/// Owns one zone's authoritative state and processes its inputs.
pub struct ZoneActor {
    record: ZoneRecord,
    zone: ZoneManager,
    movement: MovementSystem,
    combat: CombatManager,
    rosters: FxHashMap<EntityId, ProximityRoster>,
    stats_cache: FxHashMap<EntityId, CombatStats>,
    npc: NpcController,
    bus: Arc<dyn MessageBus>,
    registry: Arc<ZoneRegistry>,
    services: Services,
    catalog: AbilityCatalog,
    executor: CommandExecutor,
    rolls: Box<dyn RollSource + Send + Sync>,
    mailbox: flume::Receiver<ZoneMsg>,
    tick_interval: Duration,
}

impl ZoneActor {
    pub fn new(
        record: ZoneRecord,
        bus: Arc<dyn MessageBus>,
        registry: Arc<ZoneRegistry>,
        services: Services,
        responder: Arc<dyn NpcResponder>,
        tick_rate: f64,
    ) -> (Self, flume::Sender<ZoneMsg>) {
        let (sender, mailbox) = flume::unbounded();

        let mut command_registry = CommandRegistry::new();
        register_builtin_commands(&mut command_registry);

        let actor = Self {
            zone: ZoneManager::new(record.id.clone()),
            record,
            movement: MovementSystem::new(),
            combat: CombatManager::new(),
            rosters: FxHashMap::default(),
            stats_cache: FxHashMap::default(),
            npc: NpcController::new(responder),
            catalog: AbilityCatalog::new(Arc::clone(&services.abilities)),
            executor: CommandExecutor::new(command_registry, Arc::clone(&bus)),
            bus,
            registry,
            services,
            rolls: Box::new(RngRolls::new()),
            mailbox,
            tick_interval: Duration::from_secs_f64(tick_rate.recip()),
        };

        (actor, sender)
    }

    /// Swaps the roll source, used by deterministic tests.
    pub fn set_roll_source(&mut self, rolls: Box<dyn RollSource + Send + Sync>) {
        self.rolls = rolls;
    }

    pub fn zone(&self) -> &ZoneManager {
        &self.zone
    }

    /// Seeds the zone's resident companions from the store.
    pub async fn init_companions(&mut self) {
        let companions = match self.services.companions.find_by_zone_id(&self.record.id).await
        {
            Ok(companions) => companions,
            Err(e) => {
                error!(zone_id = self.record.id, error = %e, "companion load failed");
                return;
            }
        };

        for companion in companions {
            self.zone
                .add_companion(&companion.id, &companion.name, companion.position.into());
            self.stats_cache.insert(
                companion.id.clone(),
                derive_combat_stats(&companion.effective_stats(), companion.level),
            );
        }

        info!(
            zone_id = self.record.id,
            residents = self.zone.len(),
            "zone initialized"
        );
    }

    /// The actor loop: strictly one envelope or one tick at a time.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                message = self.mailbox.recv_async() => match message {
                    Ok(ZoneMsg::Envelope(envelope)) => self.handle_envelope(envelope).await,
                    Ok(ZoneMsg::Shutdown) | Err(_) => break,
                },
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f64();
                    last_tick = now;

                    self.tick(dt).await;
                }
            }
        }

        debug!(zone_id = self.record.id, "zone actor stopped");
    }

    pub async fn handle_envelope(&mut self, envelope: Envelope) {
        match envelope.kind {
            EnvelopeKind::PlayerJoinZone(payload) => self.on_player_join(payload).await,
            EnvelopeKind::PlayerLeaveZone(payload) => self.on_player_leave(payload).await,
            EnvelopeKind::PlayerMove(payload) => self.on_player_move(payload).await,
            EnvelopeKind::PlayerChat(payload) => self.on_player_chat(payload).await,
            EnvelopeKind::PlayerCommand(payload) => self.on_player_command(payload).await,
            EnvelopeKind::PlayerCombatAction(payload) => {
                self.on_player_combat_action(payload).await;
            }
            EnvelopeKind::PlayerProximityRefresh(payload) => {
                self.on_proximity_refresh(payload).await;
            }
            EnvelopeKind::NpcInhabit(payload) => self.on_npc_inhabit(payload).await,
            EnvelopeKind::NpcRelease(payload) => self.on_npc_release(payload).await,
            EnvelopeKind::NpcChat(payload) => self.on_npc_chat(payload).await,
            EnvelopeKind::ClientMessage(_) => {
                warn!(zone_id = self.record.id, "client message on zone input; dropping");
            }
        }
    }

    /// One simulation step: movement, combat timing, roster refresh.
    pub async fn tick(&mut self, dt: f64) {
        let now = now_millis();
        let mut dirty = false;

        for movement_event in self.movement.tick(dt, &mut self.zone) {
            match movement_event {
                MovementEvent::Moved { .. } => dirty = true,
                MovementEvent::PersistDue {
                    entity_id,
                    position,
                } => self.persist_position(&entity_id, position).await,
                MovementEvent::Stopped {
                    entity_id,
                    position,
                    reason,
                } => {
                    debug!(
                        zone_id = self.record.id,
                        entity_id,
                        reason = reason.as_str(),
                        "movement stopped"
                    );

                    self.persist_position(&entity_id, position).await;
                    self.send_state_update(&entity_id).await;
                    dirty = true;
                }
            }
        }

        let expired = self.combat.update(dt, now, |id| {
            self.stats_cache
                .get(id)
                .map_or(0.0, |stats| stats.attack_speed_bonus)
        });

        for entity_id in expired {
            self.zone.set_entity_combat_state(&entity_id, false);
            dirty = true;

            if let Some(entity) = self.zone.get_entity(&entity_id).cloned() {
                self.broadcast(
                    entity.position,
                    EVENT_BAND_METERS,
                    event::COMBAT_END,
                    &CombatEndEvent {
                        entity_id: entity.id.clone(),
                    },
                    None,
                )
                .await;
            }
        }

        if dirty {
            self.refresh_all_rosters().await;
        }
    }

    async fn on_player_join(&mut self, payload: PlayerJoinZone) {
        let character = match self.services.characters.get(&payload.character_id).await {
            Ok(Some(character)) => character,
            Ok(None) => {
                warn!(
                    zone_id = self.record.id,
                    character_id = payload.character_id,
                    "join for unknown character"
                );
                return;
            }
            Err(e) => {
                error!(error = %e, "character load failed on join");
                return;
            }
        };

        self.zone.add_player(
            &character.id,
            &character.name,
            payload.socket_id,
            character.position.into(),
            false,
        );
        self.stats_cache.insert(
            character.id.clone(),
            derive_combat_stats(&character.core_stats, character.level),
        );

        if let Err(e) = self
            .registry
            .update_player_location(&character.id, &self.record.id, payload.socket_id)
            .await
        {
            warn!(error = %e, "location update failed on join");
        }

        info!(
            zone_id = self.record.id,
            character = character.name,
            "player joined zone"
        );

        // A cleared cache makes the joiner's next delta the full roster.
        self.rosters.remove(&character.id);
        self.refresh_all_rosters().await;
    }

    async fn on_player_leave(&mut self, payload: PlayerLeaveZone) {
        let id = payload.character_id;

        self.movement.stop(&id);
        self.combat.remove(&id);
        self.rosters.remove(&id);
        self.stats_cache.remove(&id);

        if self.zone.remove_player(&id).is_some() {
            info!(zone_id = self.record.id, character_id = id, "player left zone");
        }

        if let Err(e) = self.registry.remove_player(&id).await {
            debug!(error = %e, "location removal failed on leave");
        }

        self.refresh_all_rosters().await;
    }

    async fn on_player_move(&mut self, payload: PlayerMove) {
        let id = payload.character_id;

        match payload.method {
            MoveMethod::Position => {
                let Some(position) = payload.position else {
                    return;
                };

                if self.zone.update_position(&id, position.into()) {
                    self.refresh_all_rosters().await;
                }
            }
            MoveMethod::Heading => {
                let Some(heading) = payload.heading else {
                    return;
                };

                let base_speed = self
                    .stats_cache
                    .get(&id)
                    .map_or(FALLBACK_BASE_SPEED, |stats| stats.movement_speed);

                self.movement.start(
                    &self.zone,
                    &id,
                    heading,
                    payload.speed.unwrap_or(SpeedMode::Walk),
                    base_speed,
                    MovementTarget::Heading,
                    None,
                );
            }
            MoveMethod::Stop => {
                if self.movement.stop(&id) {
                    if let Some(entity) = self.zone.get_entity(&id) {
                        let position = entity.position;
                        self.persist_position(&id, position).await;
                    }
                }
            }
        }
    }

    async fn on_player_chat(&mut self, payload: PlayerChat) {
        let Some(sender) = self.zone.get_entity(&payload.character_id).cloned() else {
            warn!(
                zone_id = self.record.id,
                character_id = payload.character_id,
                "chat from entity not in zone"
            );
            return;
        };

        match payload.channel {
            ChatChannel::Whisper => {
                let Some(target) = payload.target else {
                    self.send_error_to(&sender, "bad_whisper", "whisper needs a target")
                        .await;
                    return;
                };

                if let Err(message) = self
                    .deliver_private_message(&sender, &target, &payload.message)
                    .await
                {
                    self.send_error_to(&sender, "whisper_failed", &message).await;
                }
            }
            channel => {
                self.handle_spoken_message(&sender, channel, &payload.message, true)
                    .await;
            }
        }
    }

    async fn on_npc_chat(&mut self, payload: NpcChat) {
        let Some(sender) = self.zone.get_entity(&payload.companion_id).cloned() else {
            return;
        };

        // NPC speech is fanned out but never re-triggers NPC responders.
        self.handle_spoken_message(&sender, payload.channel, &payload.message, false)
            .await;
    }

    async fn on_player_command(&mut self, payload: PlayerCommand) {
        let Some(sender) = self.zone.get_entity(&payload.character_id).cloned() else {
            return;
        };

        let ctx = CommandContext {
            character_id: sender.id.clone(),
            character_name: sender.name.clone(),
            zone_id: self.record.id.clone(),
        };

        let result = self.executor.execute(&ctx, &payload.line).await;

        if let Some(socket_id) = sender.socket_id {
            self.send_to_socket(
                socket_id,
                event::COMMAND_RESPONSE,
                &CommandResponse {
                    success: result.success,
                    message: result.message.clone(),
                    error: result.error.clone(),
                    data: result.data.clone(),
                },
            )
            .await;
        }

        for command_event in result.events {
            self.apply_command_event(&sender, command_event).await;
        }
    }

    async fn on_player_combat_action(&mut self, payload: PlayerCombatAction) {
        let Some(attacker) = self.zone.get_entity(&payload.character_id).cloned() else {
            return;
        };

        let ability_id = payload.ability_id.as_deref().unwrap_or("basic_attack");
        let ability = match self.catalog.resolve_by_id(ability_id).await {
            Ok(ability) => ability,
            Err(e) => {
                warn!(error = %e, "ability resolution failed");
                return;
            }
        };

        let target_id = if ability.target_type == nocturne_store::TargetType::SelfOnly {
            attacker.id.clone()
        } else {
            match self.resolve_combat_target(payload.target_id.as_deref()) {
                Some(target_id) => target_id,
                None => {
                    self.send_error_to(&attacker, "no_target", "nothing to attack").await;
                    return;
                }
            }
        };

        self.execute_combat_action(&attacker.id, &target_id, &ability)
            .await;
    }

    async fn on_proximity_refresh(&mut self, payload: PlayerProximityRefresh) {
        let id = payload.character_id;

        let Some(socket_id) = self.zone.get_entity(&id).and_then(|e| e.socket_id) else {
            return;
        };

        // Invalidate the cache so the resend carries the whole roster.
        self.rosters.remove(&id);
        self.refresh_roster_for(&id, socket_id).await;
    }

    async fn on_npc_inhabit(&mut self, payload: NpcInhabit) {
        self.zone
            .set_companion_socket_id(&payload.companion_id, Some(payload.socket_id));
        self.rosters.remove(&payload.companion_id);

        info!(
            zone_id = self.record.id,
            companion_id = payload.companion_id,
            "companion inhabited"
        );

        self.refresh_all_rosters().await;
    }

    async fn on_npc_release(&mut self, payload: NpcRelease) {
        self.zone.set_companion_socket_id(&payload.companion_id, None);
        self.rosters.remove(&payload.companion_id);
        self.npc.forget(&payload.companion_id);

        info!(
            zone_id = self.record.id,
            companion_id = payload.companion_id,
            "companion released"
        );

        self.refresh_all_rosters().await;
    }

    /// Fan-out of one spoken message plus, for player speech, NPC
    /// listening and replies.
    async fn handle_spoken_message(
        &mut self,
        sender: &Entity,
        channel: ChatChannel,
        message: &str,
        trigger_npcs: bool,
    ) {
        // Calls for help are reserved for entities actually in danger.
        if channel == ChatChannel::Cfh && !sender.in_combat {
            self.send_error_to(sender, "not_in_danger", "you are in no danger")
                .await;
            return;
        }

        let listeners = self.speak(sender, channel, message).await;

        if !trigger_npcs || channel == ChatChannel::Emote {
            return;
        }

        let now = now_millis();
        let mut replies: Vec<(Entity, String)> = Vec::new();

        for listener in &listeners {
            let Some(entity) = self.zone.get_entity(listener) else {
                continue;
            };

            // Inhabited companions are player-driven; only machine
            // companions consult the responder.
            if entity.kind != EntityKind::Companion || entity.socket_id.is_some() {
                continue;
            }
            let entity = entity.clone();

            self.npc.observe(listener, &sender.name, message, now);

            let Ok(Some(companion)) = self.services.companions.get(listener).await else {
                continue;
            };

            if let Some(reply) = self.npc.respond(&companion, now).await {
                replies.push((entity, reply));
            }
        }

        for (npc_entity, reply) in replies {
            self.speak(&npc_entity, ChatChannel::Say, &reply).await;
        }
    }

    /// The non-recursive core of chat: last-speaker bookkeeping, ranged
    /// fan-out, roster refresh. Returns who was in earshot.
    async fn speak(
        &mut self,
        sender: &Entity,
        channel: ChatChannel,
        message: &str,
    ) -> Vec<EntityId> {
        let range = chat_range_meters(channel);
        let now = now_millis();

        let formatted = match channel {
            ChatChannel::Emote => format!("{} {}", sender.name, message),
            _ => message.to_owned(),
        };

        let listeners: Vec<EntityId> = self
            .zone
            .entities_in_range(sender.position, range, Some(&sender.id))
            .iter()
            .map(|(entity, _)| entity.id.clone())
            .collect();

        for listener in &listeners {
            self.zone.record_last_speaker(listener, &sender.name, now);
        }

        self.broadcast(
            sender.position,
            range,
            event::CHAT,
            &ChatEvent {
                channel,
                from: sender.name.clone(),
                from_id: sender.id.clone(),
                message: formatted,
            },
            None,
        )
        .await;

        // The roster's lastSpeaker changed for everyone in earshot.
        self.refresh_all_rosters().await;

        listeners
    }

    /// Routes a whisper through the registry to wherever the recipient is.
    async fn deliver_private_message(
        &mut self,
        sender: &Entity,
        recipient_name: &str,
        message: &str,
    ) -> Result<(), String> {
        let character = self
            .services
            .characters
            .find_by_name(recipient_name)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("no one named {recipient_name}"))?;

        let location = self
            .registry
            .get_player_location(&character.id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("{} is not in the world", character.name))?;

        self.send_to_socket(
            location.socket_id,
            event::CHAT,
            &ChatEvent {
                channel: ChatChannel::Whisper,
                from: sender.name.clone(),
                from_id: sender.id.clone(),
                message: message.to_owned(),
            },
        )
        .await;

        Ok(())
    }

    async fn apply_command_event(&mut self, sender: &Entity, command_event: CommandEvent) {
        match command_event {
            CommandEvent::Speech { channel, message } => {
                self.handle_spoken_message(sender, channel, &message, true)
                    .await;
            }
            CommandEvent::Emote { message } => {
                self.handle_spoken_message(sender, ChatChannel::Emote, &message, false)
                    .await;
            }
            CommandEvent::PrivateMessage { recipient, message } => {
                if let Err(error) = self
                    .deliver_private_message(sender, &recipient, &message)
                    .await
                {
                    self.send_error_to(sender, "whisper_failed", &error).await;
                }
            }
            CommandEvent::CombatAction { ability, target } => {
                let resolved = match &ability {
                    nocturne_command::AbilityRef::Id(id) => self.catalog.resolve_by_id(id).await,
                    nocturne_command::AbilityRef::Name(name) => {
                        self.catalog.resolve_by_name(name).await
                    }
                };

                let ability = match resolved {
                    Ok(ability) => ability,
                    Err(e) => {
                        self.send_error_to(sender, "unknown_ability", &e.to_string())
                            .await;
                        return;
                    }
                };

                let target_id = if ability.target_type == nocturne_store::TargetType::SelfOnly {
                    sender.id.clone()
                } else {
                    match self.resolve_combat_target(target.as_deref()) {
                        Some(target_id) => target_id,
                        None => {
                            self.send_error_to(sender, "no_target", "nothing to attack")
                                .await;
                            return;
                        }
                    }
                };

                self.execute_combat_action(&sender.id, &target_id, &ability)
                    .await;
            }
            CommandEvent::Movement {
                target,
                target_range_feet,
                heading,
                speed,
            } => {
                self.apply_command_movement(sender, target, target_range_feet, heading, speed)
                    .await;
            }
            CommandEvent::MovementStop => {
                self.movement.stop(&sender.id);

                if let Some(entity) = self.zone.get_entity(&sender.id) {
                    let position = entity.position;
                    self.persist_position(&sender.id, position).await;
                }
            }
        }
    }

    /// One discrete command-driven movement step.
    async fn apply_command_movement(
        &mut self,
        sender: &Entity,
        target: Option<String>,
        target_range_feet: f64,
        heading: Option<f64>,
        speed: SpeedMode,
    ) {
        let Some(current) = self.zone.get_entity(&sender.id).map(|e| e.position) else {
            return;
        };

        let next = if let Some(target_name) = target {
            let Some(target_entity) = self.zone.find_entity_by_name(&target_name) else {
                self.send_error_to(sender, "no_target", &format!("{target_name} is not here"))
                    .await;
                return;
            };

            let to_target = target_entity.position - current;
            let distance = to_target.length();
            let keep = target_range_feet * FEET_TO_METERS;
            let travel = (distance - keep).max(0.0);

            if travel <= 0.0 || distance <= 0.0 {
                current
            } else {
                current + to_target / distance * travel
            }
        } else if let Some(heading) = heading {
            let base_speed = self
                .stats_cache
                .get(&sender.id)
                .map_or(FALLBACK_BASE_SPEED, |stats| stats.movement_speed);
            let step = (base_speed * speed.multiplier()).max(0.5);

            current + step_along(heading, step)
        } else {
            return;
        };

        self.zone.update_position(&sender.id, next);
        self.persist_position(&sender.id, next).await;
        self.send_state_update(&sender.id).await;
        self.refresh_all_rosters().await;
    }

    fn resolve_combat_target(&self, target: Option<&str>) -> Option<EntityId> {
        let target = target?;

        if let Some(entity) = self.zone.get_entity(&target.to_owned()) {
            return Some(entity.id.clone());
        }

        self.zone
            .find_entity_by_name(target)
            .map(|entity| entity.id.clone())
    }

    async fn persist_position(&self, entity_id: &EntityId, position: DVec3) {
        let Some(kind) = self.zone.get_entity(entity_id).map(|e| e.kind) else {
            return;
        };

        let result = match kind {
            EntityKind::Player => {
                self.services
                    .characters
                    .update_position(entity_id, position.into())
                    .await
            }
            EntityKind::Npc | EntityKind::Companion => {
                self.services
                    .companions
                    .update_position(entity_id, position.into())
                    .await
            }
        };

        if let Err(e) = result {
            // Not fatal; the next persist or the next input supersedes.
            error!(entity_id, error = %e, "position persist failed");
        }
    }

    /// Pushes a fresh position/resource snapshot to the entity's client.
    pub(crate) async fn send_state_update(&self, entity_id: &EntityId) {
        let Some(entity) = self.zone.get_entity(entity_id) else {
            return;
        };
        let Some(socket_id) = entity.socket_id else {
            return;
        };
        let position = entity.position;

        let resources = match entity.kind {
            EntityKind::Player => self
                .services
                .characters
                .get(entity_id)
                .await
                .ok()
                .flatten()
                .map(|character| character.resources),
            EntityKind::Npc | EntityKind::Companion => self
                .services
                .companions
                .get(entity_id)
                .await
                .ok()
                .flatten()
                .map(|companion| companion.resources),
        };

        self.send_to_socket(
            socket_id,
            event::STATE_UPDATE,
            &StateUpdate {
                position: Some(position.into()),
                resources,
            },
        )
        .await;
    }

    pub(crate) async fn refresh_all_rosters(&mut self) {
        let observers: Vec<(EntityId, SocketId)> = self
            .zone
            .entities()
            .filter_map(|entity| entity.socket_id.map(|socket| (entity.id.clone(), socket)))
            .collect();

        for (entity_id, socket_id) in observers {
            self.refresh_roster_for(&entity_id, socket_id).await;
        }
    }

    async fn refresh_roster_for(&mut self, entity_id: &EntityId, socket_id: SocketId) {
        let result = self.zone.calculate_proximity_roster_delta(
            entity_id,
            self.rosters.get(entity_id),
            now_millis(),
        );

        if let Some((delta, roster)) = result {
            self.send_to_socket(socket_id, event::PROXIMITY_ROSTER_DELTA, &delta)
                .await;
            self.rosters.insert(entity_id.clone(), roster);
        }
    }

    async fn send_error_to(&self, entity: &Entity, code: &str, message: &str) {
        let Some(socket_id) = entity.socket_id else {
            return;
        };

        self.send_to_socket(
            socket_id,
            event::ERROR,
            &ErrorEvent {
                code: code.to_owned(),
                message: message.to_owned(),
                severity: Severity::Error,
            },
        )
        .await;
    }

    /// Publishes one client-addressed message on `gateway:output`.
    pub(crate) async fn send_to_socket<T: Serialize>(
        &self,
        socket_id: SocketId,
        event_name: &str,
        data: &T,
    ) {
        let envelope = Envelope::new(EnvelopeKind::ClientMessage(ClientMessage::new(
            socket_id, event_name, data,
        )))
        .with_zone(self.record.id.clone())
        .with_socket(socket_id);

        self.bus
            .publish(keys::GATEWAY_OUTPUT, &envelope.to_json())
            .await;
    }

    /// Fans an event out to every player and inhabited companion within
    /// `range` metres of `origin`.
    pub(crate) async fn broadcast<T: Serialize>(
        &self,
        origin: DVec3,
        range: f64,
        event_name: &str,
        data: &T,
        exclude: Option<&EntityId>,
    ) {
        let mut sockets = self
            .zone
            .player_socket_ids_in_range(origin, range, exclude);
        sockets.extend(
            self.zone
                .companion_socket_ids_in_range(origin, range, exclude),
        );

        for socket_id in sockets {
            self.send_to_socket(socket_id, event_name, data).await;
        }
    }

    /// Direct access to combat timing, for the pipeline and for test
    /// harnesses that pin gauges and timestamps.
    pub fn combat_mut(&mut self) -> &mut CombatManager {
        &mut self.combat
    }

    pub(crate) fn services(&self) -> &Services {
        &self.services
    }

    pub(crate) fn roll_source(&mut self) -> &mut dyn RollSource {
        self.rolls.as_mut()
    }

    pub(crate) fn cache_stats(&mut self, entity_id: &EntityId, stats: CombatStats) {
        self.stats_cache.insert(entity_id.clone(), stats);
    }

    pub(crate) fn zone_set_combat_state(&mut self, entity_id: &EntityId, in_combat: bool) {
        self.zone.set_entity_combat_state(entity_id, in_combat);
    }
}

fn chat_range_meters(channel: ChatChannel) -> f64 {
    match channel {
        ChatChannel::Say => 6.096,
        ChatChannel::Shout | ChatChannel::Emote => 45.72,
        ChatChannel::Cfh => 76.2,
        // Whispers are routed, not ranged; callers handle them earlier.
        ChatChannel::Whisper => 6.096,
    }
}
