//! Channel names and KV key layout shared by every process in the cluster.

use crate::types::{CharacterId, ZoneId};

/// Channel carrying all client-addressed messages back to the gateways.
pub const GATEWAY_OUTPUT: &str = "gateway:output";

/// Pattern matching every zone input channel.
pub const ZONE_INPUT_PATTERN: &str = "zone:*:input";

/// Input channel of one zone.
pub fn zone_input_channel(zone_id: &ZoneId) -> String {
    format!("zone:{zone_id}:input")
}

/// Liveness key of one server, written with a 15 s TTL every 5 s.
pub fn heartbeat_key(server_id: &str) -> String {
    format!("server:heartbeat:{server_id}")
}

pub const HEARTBEAT_KEY_PATTERN: &str = "server:heartbeat:*";

/// Ownership record of one zone. Not TTL'd; the owner's heartbeat is.
pub fn zone_assignment_key(zone_id: &ZoneId) -> String {
    format!("zone:assignment:{zone_id}")
}

pub const ZONE_ASSIGNMENT_KEY_PATTERN: &str = "zone:assignment:*";

/// Location record of one character, TTL 3600 s.
pub fn player_location_key(character_id: &CharacterId) -> String {
    format!("player:location:{character_id}")
}

/// Command cooldown marker, TTL equal to the command's cooldown.
pub fn command_cooldown_key(character_id: &CharacterId, command: &str) -> String {
    format!("cooldown:{character_id}:{command}")
}

/// Extracts the trailing id from a scanned key, e.g. the zone id out of
/// `zone:assignment:<zoneId>`.
pub fn trailing_id<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)
}
