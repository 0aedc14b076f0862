#![doc = include_str!("../README.md")]

pub mod envelope;
pub mod event;
pub mod keys;
pub mod roster;
pub mod types;

use std::time::{SystemTime, UNIX_EPOCH};

pub use envelope::{Envelope, EnvelopeKind};
pub use roster::{ProximityRoster, ProximityRosterDelta, RangeBand};
pub use types::{CharacterId, CompanionId, EntityId, EntityKind, Position, SocketId, ZoneId};

/// The protocol version offered in `handshake_ack`. Clients are compatible
/// when their major version matches.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Returns whether a client-reported protocol version is compatible with
/// [`PROTOCOL_VERSION`].
pub fn is_compatible_version(client_version: &str) -> bool {
    match (
        client_version.split('.').next(),
        PROTOCOL_VERSION.split('.').next(),
    ) {
        (Some(client_major), Some(server_major)) => client_major == server_major,
        _ => false,
    }
}

/// Milliseconds since the Unix epoch, the timestamp convention used by
/// every envelope and KV record.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_compatibility_is_major_only() {
        assert!(is_compatible_version("1.0.0"));
        assert!(is_compatible_version("1.9.3"));
        assert!(!is_compatible_version("2.0.0"));
        assert!(!is_compatible_version("garbage"));
    }
}
