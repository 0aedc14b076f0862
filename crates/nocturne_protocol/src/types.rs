//! Shared data types carried on the wire and through the bus.

use std::fmt;

use nocturne_math::DVec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a persistent character record.
pub type CharacterId = String;
/// Identifier of a companion record.
pub type CompanionId = String;
/// Identifier of an entity resident in a zone. For players this equals the
/// character id, for companions the companion id.
pub type EntityId = String;
/// Identifier of a zone record.
pub type ZoneId = String;

/// Handle of one client socket, assigned by the owning gateway.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketId(pub Uuid);

impl SocketId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What kind of participant an entity is.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Npc,
    Companion,
}

/// A world position in metres.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl From<DVec3> for Position {
    fn from(v: DVec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Position> for DVec3 {
    fn from(p: Position) -> Self {
        DVec3::new(p.x, p.y, p.z)
    }
}

/// Core attributes of a character or companion.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreStats {
    pub strength: f64,
    pub dexterity: f64,
    pub constitution: f64,
    pub intelligence: f64,
    pub wisdom: f64,
    pub charisma: f64,
    pub agility: f64,
}

impl Default for CoreStats {
    fn default() -> Self {
        Self {
            strength: 10.0,
            dexterity: 10.0,
            constitution: 10.0,
            intelligence: 10.0,
            wisdom: 10.0,
            charisma: 10.0,
            agility: 10.0,
        }
    }
}

impl CoreStats {
    /// Looks a stat up by its camelCase name, the form ability damage specs
    /// use for their scaling stat.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "strength" => Some(self.strength),
            "dexterity" => Some(self.dexterity),
            "constitution" => Some(self.constitution),
            "intelligence" => Some(self.intelligence),
            "wisdom" => Some(self.wisdom),
            "charisma" => Some(self.charisma),
            "agility" => Some(self.agility),
            _ => None,
        }
    }
}

/// Spendable pools of a character or companion.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub health: f64,
    pub max_health: f64,
    pub stamina: f64,
    pub max_stamina: f64,
    pub mana: f64,
    pub max_mana: f64,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            health: 100.0,
            max_health: 100.0,
            stamina: 100.0,
            max_stamina: 100.0,
            mana: 100.0,
            max_mana: 100.0,
        }
    }
}

/// Combat ratings derived from core stats and level at the moment of use.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatStats {
    pub attack_rating: f64,
    pub defense_rating: f64,
    pub physical_accuracy: f64,
    pub evasion: f64,
    pub damage_absorption: f64,
    pub glancing_blow_chance: f64,
    pub magic_attack: f64,
    pub magic_defense: f64,
    pub magic_accuracy: f64,
    pub magic_evasion: f64,
    pub magic_absorption: f64,
    pub critical_hit_chance: f64,
    pub penetrating_blow_chance: f64,
    pub deflected_blow_chance: f64,
    pub attack_speed_bonus: f64,
    pub movement_speed: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_round_trips_through_vec3() {
        let p = Position::new(1.5, -2.0, 3.25);
        let v: DVec3 = p.into();

        assert_eq!(Position::from(v), p);
    }

    #[test]
    fn core_stats_lookup_by_name() {
        let stats = CoreStats {
            agility: 14.0,
            ..Default::default()
        };

        assert_eq!(stats.get("agility"), Some(14.0));
        assert_eq!(stats.get("luck"), None);
    }
}
