//! Combat stat derivation.
//!
//! Ratings are recomputed from core stats and level at the moment an
//! ability is used, never cached across level-ups or buffs.

use nocturne_protocol::types::{CombatStats, CoreStats};

/// Derives the full combat stat block for a combatant.
pub fn derive_combat_stats(core: &CoreStats, level: u32) -> CombatStats {
    let level = f64::from(level);

    CombatStats {
        attack_rating: core.strength * 2.0 + level * 1.5,
        defense_rating: core.constitution * 1.5 + core.agility * 0.5 + level,
        physical_accuracy: 75.0 + core.dexterity * 0.5 + level * 0.25,
        evasion: core.agility * 0.5 + core.dexterity * 0.25,
        damage_absorption: core.constitution * 0.25,
        glancing_blow_chance: 5.0 + core.agility * 0.1,
        magic_attack: core.intelligence * 2.0 + level * 1.5,
        magic_defense: core.wisdom * 1.5 + level,
        magic_accuracy: 75.0 + core.intelligence * 0.5 + level * 0.25,
        magic_evasion: core.wisdom * 0.5 + core.intelligence * 0.25,
        magic_absorption: core.wisdom * 0.25,
        critical_hit_chance: 5.0 + core.dexterity * 0.2,
        penetrating_blow_chance: 5.0 + core.strength * 0.1,
        deflected_blow_chance: 5.0 + core.constitution * 0.1,
        attack_speed_bonus: core.dexterity * 0.1,
        movement_speed: 1.4 + core.agility * 0.05,
    }
}
