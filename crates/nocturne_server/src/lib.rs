#![doc = include_str!("../README.md")]

mod combat_pipeline;
mod npc;
mod world_manager;
mod zone_actor;

pub use npc::{
    ChatMemory, NpcController, NpcResponder, SilentResponder, NPC_CONTEXT_MAX_MESSAGES,
    NPC_CONTEXT_WINDOW_MS,
};
pub use world_manager::WorldManager;
pub use zone_actor::{ZoneActor, ZoneMsg};

/// Default tick rate of a dedicated zone server.
pub const DEFAULT_TICK_RATE: f64 = 20.0;
/// Default tick rate in combined single-process mode.
pub const COMBINED_TICK_RATE: f64 = 10.0;
