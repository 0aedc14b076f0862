#![doc = include_str!("../README.md")]
#![deny(
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
    rustdoc::invalid_codeblock_attributes,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::bare_urls,
    rustdoc::invalid_html_tags
)]


pub use {
    nocturne_bus as bus, nocturne_combat as combat, nocturne_command as command,
    nocturne_gateway as gateway, nocturne_math as math, nocturne_protocol as protocol,
    nocturne_registry as registry, nocturne_server as server, nocturne_store as store,
    nocturne_world as world,
};

/// Contains the most frequently used items in Nocturne backends.
pub mod prelude {
    pub use nocturne_bus::{InMemoryBus, MessageBus};
    pub use nocturne_math::DVec3;
    pub use nocturne_protocol::envelope::{Envelope, EnvelopeKind};
    pub use nocturne_protocol::types::{
        CharacterId, EntityId, EntityKind, Position, SocketId, ZoneId,
    };
    pub use nocturne_protocol::{ProximityRoster, ProximityRosterDelta, RangeBand};
    pub use nocturne_registry::ZoneRegistry;
    pub use nocturne_server::{WorldManager, ZoneActor};
    pub use nocturne_store::{MemoryStore, Services};
    pub use nocturne_world::ZoneManager;
}
