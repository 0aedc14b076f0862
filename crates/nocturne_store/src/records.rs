//! Record types mirrored from the persistent datastore.

use nocturne_protocol::types::{CharacterId, CompanionId, CoreStats, Position, Resources, ZoneId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub username: String,
    pub is_guest: bool,
    pub max_characters: u32,
    pub created_at: i64,
    pub last_seen: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    pub account_id: String,
    pub name: String,
    pub level: u32,
    pub zone_id: ZoneId,
    pub position: Position,
    pub core_stats: CoreStats,
    pub resources: Resources,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<Value>,
    pub created_at: i64,
    pub last_seen: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Companion {
    pub id: CompanionId,
    pub name: String,
    pub description: String,
    pub zone_id: ZoneId,
    pub position: Position,
    /// Stored as loose JSON in the datastore; missing stats default to 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<CoreStats>,
    pub resources: Resources,
    pub level: u32,
}

impl Companion {
    /// Core stats with the datastore's default of 10 per missing stat.
    pub fn effective_stats(&self) -> CoreStats {
        self.stats.unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRecord {
    pub id: ZoneId,
    pub name: String,
    pub description: String,
    pub content_rating: String,
    /// World coordinates of the zone origin.
    pub origin: Position,
    /// Edge length in metres.
    pub size: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[serde(rename = "self")]
    SelfOnly,
    Enemy,
    Ally,
    Ground,
    Aoe,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Physical,
    Magic,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageSpec {
    #[serde(rename = "type")]
    pub damage_type: DamageType,
    pub amount: f64,
    pub scaling_stat: String,
    pub scaling_multiplier: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingSpec {
    pub amount: f64,
    pub scaling_stat: String,
    pub scaling_multiplier: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityDef {
    pub id: String,
    pub name: String,
    pub description: String,
    pub target_type: TargetType,
    /// Maximum use range in metres.
    pub range: f64,
    /// Cooldown in seconds.
    pub cooldown: f64,
    pub atb_cost: f64,
    /// Builders refund their ATB cost on use.
    pub is_builder: bool,
    /// Free abilities skip the ATB gate entirely.
    pub is_free: bool,
    pub stamina_cost: f64,
    pub mana_cost: f64,
    pub health_cost: f64,
    pub cast_time: f64,
    pub aoe_radius: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<DamageSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healing: Option<HealingSpec>,
}

impl AbilityDef {
    /// The built-in fallback every combatant can always use.
    pub fn basic_attack() -> Self {
        Self {
            id: "basic_attack".to_owned(),
            name: "Basic Attack".to_owned(),
            description: "A plain strike with whatever is at hand.".to_owned(),
            target_type: TargetType::Enemy,
            range: 2.0,
            cooldown: 0.0,
            atb_cost: 100.0,
            is_builder: false,
            is_free: false,
            stamina_cost: 0.0,
            mana_cost: 0.0,
            health_cost: 0.0,
            cast_time: 0.0,
            aoe_radius: 0.0,
            damage: Some(DamageSpec {
                damage_type: DamageType::Physical,
                amount: 5.0,
                scaling_stat: "strength".to_owned(),
                scaling_multiplier: 0.5,
            }),
            healing: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: String,
    pub character_id: CharacterId,
    pub name: String,
    pub slot: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}
