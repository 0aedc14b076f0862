#![doc = include_str!("../README.md")]

mod movement;
mod roster;
mod zone;

pub use movement::{
    MovementEvent, MovementSystem, MovementTarget, StopReason, DB_PERSIST_INTERVAL,
};
pub use roster::{apply_delta, compute_roster, diff_rosters};
pub use zone::{Entity, ZoneManager, LAST_SPEAKER_TTL_MS};
