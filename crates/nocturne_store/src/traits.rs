//! Async service interfaces over the datastore.
//!
//! Every call is a suspension point; implementations may go to a remote
//! database. Lookups by name are case-insensitive throughout.

use async_trait::async_trait;
use nocturne_protocol::types::{CharacterId, CompanionId, Position, Resources, ZoneId};
use serde_json::Value;

use crate::records::{
    Account, AbilityDef, Character, Companion, InventoryItem, ZoneRecord,
};
use crate::StoreError;

#[async_trait]
pub trait AccountService: Send + Sync + 'static {
    async fn get(&self, id: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    /// Creates a throwaway guest account.
    async fn create_guest(&self, username: &str) -> Result<Account, StoreError>;

    async fn update_last_seen(&self, id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CharacterService: Send + Sync + 'static {
    async fn get(&self, id: &CharacterId) -> Result<Option<Character>, StoreError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Character>, StoreError>;

    async fn find_by_account_id(&self, account_id: &str) -> Result<Vec<Character>, StoreError>;

    async fn find_by_zone_id(&self, zone_id: &ZoneId) -> Result<Vec<Character>, StoreError>;

    async fn create(
        &self,
        account_id: &str,
        name: &str,
        zone_id: &ZoneId,
        position: Position,
        appearance: Option<Value>,
    ) -> Result<Character, StoreError>;

    async fn update_position(
        &self,
        id: &CharacterId,
        position: Position,
    ) -> Result<(), StoreError>;

    async fn update_resources(
        &self,
        id: &CharacterId,
        resources: Resources,
    ) -> Result<(), StoreError>;

    /// Clamped write of current health alone, the hot path out of combat.
    async fn update_health(&self, id: &CharacterId, health: f64) -> Result<(), StoreError>;

    async fn update_zone(&self, id: &CharacterId, zone_id: &ZoneId) -> Result<(), StoreError>;

    async fn update_last_seen(&self, id: &CharacterId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CompanionService: Send + Sync + 'static {
    async fn get(&self, id: &CompanionId) -> Result<Option<Companion>, StoreError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Companion>, StoreError>;

    async fn find_by_zone_id(&self, zone_id: &ZoneId) -> Result<Vec<Companion>, StoreError>;

    async fn update_position(
        &self,
        id: &CompanionId,
        position: Position,
    ) -> Result<(), StoreError>;

    async fn update_resources(
        &self,
        id: &CompanionId,
        resources: Resources,
    ) -> Result<(), StoreError>;

    async fn update_health(&self, id: &CompanionId, health: f64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AbilityService: Send + Sync + 'static {
    async fn get(&self, id: &str) -> Result<Option<AbilityDef>, StoreError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<AbilityDef>, StoreError>;

    async fn all(&self) -> Result<Vec<AbilityDef>, StoreError>;
}

#[async_trait]
pub trait ZoneService: Send + Sync + 'static {
    async fn get(&self, id: &ZoneId) -> Result<Option<ZoneRecord>, StoreError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<ZoneRecord>, StoreError>;

    async fn all(&self) -> Result<Vec<ZoneRecord>, StoreError>;
}

#[async_trait]
pub trait InventoryService: Send + Sync + 'static {
    async fn find_by_character_id(
        &self,
        character_id: &CharacterId,
    ) -> Result<Vec<InventoryItem>, StoreError>;

    async fn add_item(&self, item: InventoryItem) -> Result<(), StoreError>;

    async fn remove_item(&self, id: &str) -> Result<(), StoreError>;
}
