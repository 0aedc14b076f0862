#![doc = include_str!("../README.md")]

mod catalog;
mod damage;
mod manager;
mod stats;

use thiserror::Error;

pub use catalog::AbilityCatalog;
pub use damage::{calculate_damage, DamageResult, Outcome, RngRolls, RollSource, ScriptedRolls};
pub use manager::{
    CombatManager, CombatantState, ATB_BASE_RATE, ATB_MAX, COMBAT_TIMEOUT_MS,
};
pub use stats::derive_combat_stats;

#[derive(Debug, Error)]
pub enum CombatError {
    #[error("unknown ability {0:?}")]
    UnknownAbility(String),
    #[error(transparent)]
    Store(#[from] nocturne_store::StoreError),
}
