//! Ability resolution against the datastore.

use std::sync::Arc;

use nocturne_store::{AbilityDef, AbilityService};

use crate::CombatError;

/// Resolves abilities by id or name. Id resolution falls back to the
/// built-in `basic_attack` so a combatant can always swing; name
/// resolution fails on unknowns since the player typed it.
pub struct AbilityCatalog {
    abilities: Arc<dyn AbilityService>,
}

impl AbilityCatalog {
    pub fn new(abilities: Arc<dyn AbilityService>) -> Self {
        Self { abilities }
    }

    pub async fn resolve_by_id(&self, id: &str) -> Result<AbilityDef, CombatError> {
        if let Some(ability) = self.abilities.get(id).await? {
            return Ok(ability);
        }

        Ok(AbilityDef::basic_attack())
    }

    pub async fn resolve_by_name(&self, name: &str) -> Result<AbilityDef, CombatError> {
        if let Some(ability) = self.abilities.find_by_name(name).await? {
            return Ok(ability);
        }

        if name.eq_ignore_ascii_case("basic attack") {
            return Ok(AbilityDef::basic_attack());
        }

        Err(CombatError::UnknownAbility(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use nocturne_store::{MemoryStore, Services};

    use super::*;

    fn catalog_with(seed: Option<AbilityDef>) -> AbilityCatalog {
        let store = Arc::new(MemoryStore::new());

        if let Some(ability) = seed {
            store.seed_ability(ability);
        }

        AbilityCatalog::new(Services::from_memory(store).abilities)
    }

    #[tokio::test]
    async fn unknown_id_falls_back_to_basic_attack() {
        let catalog = catalog_with(None);

        let ability = catalog.resolve_by_id("missing").await.unwrap();

        assert_eq!(ability.id, "basic_attack");
    }

    #[tokio::test]
    async fn known_id_resolves_from_store() {
        let mut smite = AbilityDef::basic_attack();
        smite.id = "smite".to_owned();
        smite.name = "Smite".to_owned();

        let catalog = catalog_with(Some(smite));

        let ability = catalog.resolve_by_id("smite").await.unwrap();
        assert_eq!(ability.name, "Smite");

        let ability = catalog.resolve_by_name("smite").await.unwrap();
        assert_eq!(ability.id, "smite");
    }

    #[tokio::test]
    async fn unknown_name_is_an_error() {
        let catalog = catalog_with(None);

        assert!(catalog.resolve_by_name("moonfire").await.is_err());
    }
}
