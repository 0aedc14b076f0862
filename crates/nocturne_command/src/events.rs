//! Semantic events produced by command handlers.
//!
//! Handlers never touch the network or the datastore; they describe what
//! should happen and the zone orchestrator translates each event into its
//! native effect (chat broadcast, combat action, movement step, private
//! message).

use nocturne_protocol::envelope::{ChatChannel, SpeedMode};
use serde_json::Value;

/// How a combat command names its ability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbilityRef {
    /// Resolve by id, falling back to the basic attack.
    Id(String),
    /// Resolve by display name; unknown names fail.
    Name(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CommandEvent {
    Speech {
        channel: ChatChannel,
        message: String,
    },
    Emote {
        message: String,
    },
    PrivateMessage {
        recipient: String,
        message: String,
    },
    CombatAction {
        ability: AbilityRef,
        target: Option<String>,
    },
    /// One discrete movement step, either toward a named target or along
    /// a heading.
    Movement {
        target: Option<String>,
        target_range_feet: f64,
        heading: Option<f64>,
        speed: SpeedMode,
    },
    MovementStop,
}

/// What a handler produced. `events` carry the side effects; `message` and
/// `error` are relayed to the invoking client as a `command_response`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandResult {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    pub data: Option<Value>,
    pub events: Vec<CommandEvent>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_events(events: Vec<CommandEvent>) -> Self {
        Self {
            success: true,
            events,
            ..Default::default()
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
