#![doc = include_str!("../README.md")]

mod memory;
mod records;
mod traits;

use std::sync::Arc;

use thiserror::Error;

pub use memory::MemoryStore;
pub use records::{
    Account, AbilityDef, Character, Companion, DamageSpec, DamageType, HealingSpec,
    InventoryItem, TargetType, ZoneRecord,
};
pub use traits::{
    AbilityService, AccountService, CharacterService, CompanionService, InventoryService,
    ZoneService,
};

/// Errors from the persistent store. Handlers treat these as recoverable:
/// log, surface a user error, and let the next tick or input supersede.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id:?} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} named {name:?} already exists")]
    Duplicate { kind: &'static str, name: String },
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// The bundle of store services a process works against, cheap to clone
/// and passed explicitly through construction.
#[derive(Clone)]
pub struct Services {
    pub accounts: Arc<dyn AccountService>,
    pub characters: Arc<dyn CharacterService>,
    pub companions: Arc<dyn CompanionService>,
    pub abilities: Arc<dyn AbilityService>,
    pub zones: Arc<dyn ZoneService>,
    pub inventory: Arc<dyn InventoryService>,
}

impl Services {
    /// Wires every service to one shared [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    /// Wires every service to an existing [`MemoryStore`], keeping the
    /// handle around for seeding.
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            accounts: store.clone(),
            characters: store.clone(),
            companions: store.clone(),
            abilities: store.clone(),
            zones: store.clone(),
            inventory: store,
        }
    }
}
