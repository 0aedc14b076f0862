//! Envelopes exchanged over the message bus.
//!
//! A zone server subscribes to `zone:<zoneId>:input` and receives the
//! player/NPC variants; every client-directed message travels the other way
//! on `gateway:output` as a [`ClientMessage`]. Unknown `type` tags fail
//! deserialization and are logged and dropped by the receiver.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::now_millis;
use crate::types::{CharacterId, CompanionId, EntityId, Position, SocketId, ZoneId};

/// One bus message. `kind` flattens to the wire's `type` + `payload` pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(flatten)]
    pub kind: EnvelopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<CharacterId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_id: Option<SocketId>,
    pub timestamp: i64,
}

impl Envelope {
    /// Wraps a payload with the current timestamp and no addressing.
    pub fn new(kind: EnvelopeKind) -> Self {
        Self {
            kind,
            zone_id: None,
            character_id: None,
            socket_id: None,
            timestamp: now_millis(),
        }
    }

    pub fn with_zone(mut self, zone_id: impl Into<ZoneId>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }

    pub fn with_character(mut self, character_id: impl Into<CharacterId>) -> Self {
        self.character_id = Some(character_id.into());
        self
    }

    pub fn with_socket(mut self, socket_id: SocketId) -> Self {
        self.socket_id = Some(socket_id);
        self
    }

    /// Serializes for the bus. Envelope payloads are plain data; this
    /// cannot fail.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("envelope serializes")
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// The typed payload of an [`Envelope`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeKind {
    PlayerJoinZone(PlayerJoinZone),
    PlayerLeaveZone(PlayerLeaveZone),
    PlayerMove(PlayerMove),
    PlayerChat(PlayerChat),
    PlayerCommand(PlayerCommand),
    PlayerCombatAction(PlayerCombatAction),
    PlayerProximityRefresh(PlayerProximityRefresh),
    NpcInhabit(NpcInhabit),
    NpcRelease(NpcRelease),
    NpcChat(NpcChat),
    ClientMessage(ClientMessage),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinZone {
    pub character_id: CharacterId,
    pub socket_id: SocketId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeaveZone {
    pub character_id: CharacterId,
}

/// How a `PLAYER_MOVE` updates the mover.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveMethod {
    /// Set the position directly.
    Position,
    /// Begin or adjust tick-integrated movement along a heading.
    Heading,
    /// Halt tick-integrated movement.
    Stop,
}

/// Movement speed selector. Multipliers are applied to the entity's base
/// speed by the movement system.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedMode {
    #[default]
    Walk,
    Jog,
    Run,
    Stop,
}

impl SpeedMode {
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Walk => 1.0,
            Self::Jog => 2.0,
            Self::Run => 3.5,
            Self::Stop => 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMove {
    pub character_id: CharacterId,
    pub method: MoveMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<SpeedMode>,
}

/// Range band a chat message is spoken on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatChannel {
    Say,
    Shout,
    Emote,
    Whisper,
    Cfh,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerChat {
    pub character_id: CharacterId,
    pub channel: ChatChannel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCommand {
    pub character_id: CharacterId,
    /// The raw command line as typed, including the leading slash.
    pub line: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCombatAction {
    pub character_id: CharacterId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProximityRefresh {
    pub character_id: CharacterId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcInhabit {
    pub companion_id: CompanionId,
    pub socket_id: SocketId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcRelease {
    pub companion_id: CompanionId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcChat {
    pub companion_id: CompanionId,
    pub channel: ChatChannel,
    pub message: String,
}

/// A client-addressed message published on `gateway:output`. The gateway
/// owning `socket_id` forwards `event`/`data` to the matching local socket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    pub socket_id: SocketId,
    pub event: String,
    pub data: Value,
}

impl ClientMessage {
    /// Builds a client message from a typed payload. Serialization of the
    /// payload types in this crate cannot fail.
    pub fn new<T: Serialize>(socket_id: SocketId, event: &str, data: &T) -> Self {
        Self {
            socket_id,
            event: event.to_owned(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }
}
