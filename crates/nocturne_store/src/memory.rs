//! In-process store used by tests and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use nocturne_protocol::types::{CharacterId, CompanionId, Position, Resources, ZoneId};
use nocturne_protocol::now_millis;
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::records::{
    Account, AbilityDef, Character, Companion, InventoryItem, ZoneRecord,
};
use crate::traits::{
    AbilityService, AccountService, CharacterService, CompanionService, InventoryService,
    ZoneService,
};
use crate::StoreError;

/// Every service trait over shared in-process tables.
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<String, Account>>,
    characters: RwLock<HashMap<CharacterId, Character>>,
    companions: RwLock<HashMap<CompanionId, Companion>>,
    abilities: RwLock<HashMap<String, AbilityDef>>,
    zones: RwLock<HashMap<ZoneId, ZoneRecord>>,
    inventory: RwLock<HashMap<String, InventoryItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_zone(&self, zone: ZoneRecord) {
        self.zones.write().insert(zone.id.clone(), zone);
    }

    pub fn seed_character(&self, character: Character) {
        self.characters
            .write()
            .insert(character.id.clone(), character);
    }

    pub fn seed_companion(&self, companion: Companion) {
        self.companions
            .write()
            .insert(companion.id.clone(), companion);
    }

    pub fn seed_ability(&self, ability: AbilityDef) {
        self.abilities.write().insert(ability.id.clone(), ability);
    }

    pub fn seed_account(&self, account: Account) {
        self.accounts.write().insert(account.id.clone(), account);
    }
}

#[async_trait]
impl AccountService for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts
            .read()
            .values()
            .find(|account| account.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn create_guest(&self, username: &str) -> Result<Account, StoreError> {
        let now = now_millis();
        let account = Account {
            id: format!("acct-{}", Uuid::new_v4()),
            username: username.to_owned(),
            is_guest: true,
            max_characters: 4,
            created_at: now,
            last_seen: now,
        };

        self.accounts
            .write()
            .insert(account.id.clone(), account.clone());

        Ok(account)
    }

    async fn update_last_seen(&self, id: &str) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write();
        let account = accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("account", id))?;

        account.last_seen = now_millis();

        Ok(())
    }
}

#[async_trait]
impl CharacterService for MemoryStore {
    async fn get(&self, id: &CharacterId) -> Result<Option<Character>, StoreError> {
        Ok(self.characters.read().get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Character>, StoreError> {
        Ok(self
            .characters
            .read()
            .values()
            .find(|character| character.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn find_by_account_id(&self, account_id: &str) -> Result<Vec<Character>, StoreError> {
        let mut characters: Vec<Character> = self
            .characters
            .read()
            .values()
            .filter(|character| character.account_id == account_id)
            .cloned()
            .collect();
        characters.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(characters)
    }

    async fn find_by_zone_id(&self, zone_id: &ZoneId) -> Result<Vec<Character>, StoreError> {
        Ok(self
            .characters
            .read()
            .values()
            .filter(|character| &character.zone_id == zone_id)
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        account_id: &str,
        name: &str,
        zone_id: &ZoneId,
        position: Position,
        appearance: Option<Value>,
    ) -> Result<Character, StoreError> {
        if CharacterService::find_by_name(self, name).await?.is_some() {
            return Err(StoreError::Duplicate {
                kind: "character",
                name: name.to_owned(),
            });
        }

        let now = now_millis();
        let character = Character {
            id: format!("char-{}", Uuid::new_v4()),
            account_id: account_id.to_owned(),
            name: name.to_owned(),
            level: 1,
            zone_id: zone_id.clone(),
            position,
            core_stats: Default::default(),
            resources: Default::default(),
            appearance,
            created_at: now,
            last_seen: now,
        };

        self.characters
            .write()
            .insert(character.id.clone(), character.clone());

        Ok(character)
    }

    async fn update_position(
        &self,
        id: &CharacterId,
        position: Position,
    ) -> Result<(), StoreError> {
        self.with_character(id, |character| character.position = position)
    }

    async fn update_resources(
        &self,
        id: &CharacterId,
        resources: Resources,
    ) -> Result<(), StoreError> {
        self.with_character(id, |character| character.resources = resources)
    }

    async fn update_health(&self, id: &CharacterId, health: f64) -> Result<(), StoreError> {
        self.with_character(id, |character| {
            character.resources.health = health.clamp(0.0, character.resources.max_health);
        })
    }

    async fn update_zone(&self, id: &CharacterId, zone_id: &ZoneId) -> Result<(), StoreError> {
        self.with_character(id, |character| character.zone_id = zone_id.clone())
    }

    async fn update_last_seen(&self, id: &CharacterId) -> Result<(), StoreError> {
        self.with_character(id, |character| character.last_seen = now_millis())
    }
}

impl MemoryStore {
    fn with_character(
        &self,
        id: &CharacterId,
        mutate: impl FnOnce(&mut Character),
    ) -> Result<(), StoreError> {
        let mut characters = self.characters.write();
        let character = characters
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("character", id.clone()))?;

        mutate(character);

        Ok(())
    }

    fn with_companion(
        &self,
        id: &CompanionId,
        mutate: impl FnOnce(&mut Companion),
    ) -> Result<(), StoreError> {
        let mut companions = self.companions.write();
        let companion = companions
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("companion", id.clone()))?;

        mutate(companion);

        Ok(())
    }
}

#[async_trait]
impl CompanionService for MemoryStore {
    async fn get(&self, id: &CompanionId) -> Result<Option<Companion>, StoreError> {
        Ok(self.companions.read().get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Companion>, StoreError> {
        Ok(self
            .companions
            .read()
            .values()
            .find(|companion| companion.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn find_by_zone_id(&self, zone_id: &ZoneId) -> Result<Vec<Companion>, StoreError> {
        Ok(self
            .companions
            .read()
            .values()
            .filter(|companion| &companion.zone_id == zone_id)
            .cloned()
            .collect())
    }

    async fn update_position(
        &self,
        id: &CompanionId,
        position: Position,
    ) -> Result<(), StoreError> {
        self.with_companion(id, |companion| companion.position = position)
    }

    async fn update_resources(
        &self,
        id: &CompanionId,
        resources: Resources,
    ) -> Result<(), StoreError> {
        self.with_companion(id, |companion| companion.resources = resources)
    }

    async fn update_health(&self, id: &CompanionId, health: f64) -> Result<(), StoreError> {
        self.with_companion(id, |companion| {
            companion.resources.health = health.clamp(0.0, companion.resources.max_health);
        })
    }
}

#[async_trait]
impl AbilityService for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<AbilityDef>, StoreError> {
        Ok(self.abilities.read().get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<AbilityDef>, StoreError> {
        Ok(self
            .abilities
            .read()
            .values()
            .find(|ability| ability.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn all(&self) -> Result<Vec<AbilityDef>, StoreError> {
        Ok(self.abilities.read().values().cloned().collect())
    }
}

#[async_trait]
impl ZoneService for MemoryStore {
    async fn get(&self, id: &ZoneId) -> Result<Option<ZoneRecord>, StoreError> {
        Ok(self.zones.read().get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ZoneRecord>, StoreError> {
        Ok(self
            .zones
            .read()
            .values()
            .find(|zone| zone.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn all(&self) -> Result<Vec<ZoneRecord>, StoreError> {
        let mut zones: Vec<ZoneRecord> = self.zones.read().values().cloned().collect();
        zones.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(zones)
    }
}

#[async_trait]
impl InventoryService for MemoryStore {
    async fn find_by_character_id(
        &self,
        character_id: &CharacterId,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        Ok(self
            .inventory
            .read()
            .values()
            .filter(|item| &item.character_id == character_id)
            .cloned()
            .collect())
    }

    async fn add_item(&self, item: InventoryItem) -> Result<(), StoreError> {
        self.inventory.write().insert(item.id.clone(), item);

        Ok(())
    }

    async fn remove_item(&self, id: &str) -> Result<(), StoreError> {
        self.inventory
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("inventory item", id))
    }
}
