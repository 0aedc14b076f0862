#![doc = include_str!("../README.md")]

mod auth;
mod gateway;
mod session;
mod transport;

use nocturne_protocol::types::{Position, ZoneId};

pub use auth::{AuthFailure, AuthOutcome, AuthProvider, GuestAuthProvider};
pub use gateway::{Gateway, SocketTable};
pub use session::Session;
pub use transport::{
    channel, tcp_transport, Inbound, SocketReader, SocketWriter, TcpSocketReader,
    TcpSocketWriter,
};

/// Process-wide gateway configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// TCP port the dev transport listens on.
    pub port: u16,
    /// Zone new characters spawn into.
    pub starter_zone_id: ZoneId,
    /// Spawn point inside the starter zone.
    pub spawn_position: Position,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            starter_zone_id: "haven-square".to_owned(),
            spawn_position: Position::default(),
        }
    }
}
