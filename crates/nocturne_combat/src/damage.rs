//! The damage calculator: a pure function from ability + stat blocks +
//! rolls to a classified result.

use nocturne_protocol::types::CombatStats;
use nocturne_store::{AbilityDef, DamageType};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Source of uniform 0–100 rolls. Injected so tests can script outcomes.
pub trait RollSource {
    fn roll_percent(&mut self) -> f64;
}

/// Production rolls from a small PRNG seeded with entropy.
pub struct RngRolls(SmallRng);

impl RngRolls {
    pub fn new() -> Self {
        Self(SmallRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

impl Default for RngRolls {
    fn default() -> Self {
        Self::new()
    }
}

impl RollSource for RngRolls {
    fn roll_percent(&mut self) -> f64 {
        self.0.gen_range(0.0..100.0)
    }
}

/// Fixed roll sequence for tests. Panics when exhausted, which in a test
/// is the right failure.
pub struct ScriptedRolls {
    rolls: Vec<f64>,
    next: usize,
}

impl ScriptedRolls {
    pub fn new(rolls: impl Into<Vec<f64>>) -> Self {
        Self {
            rolls: rolls.into(),
            next: 0,
        }
    }
}

impl RollSource for ScriptedRolls {
    fn roll_percent(&mut self) -> f64 {
        let roll = self.rolls[self.next];
        self.next += 1;
        roll
    }
}

/// How a landed blow was classified.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Miss,
    Hit,
    Crit,
    Glance,
    Penetrating,
    Deflected,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Miss => "miss",
            Outcome::Hit => "hit",
            Outcome::Crit => "crit",
            Outcome::Glance => "glance",
            Outcome::Penetrating => "penetrating",
            Outcome::Deflected => "deflected",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DamageResult {
    pub hit: bool,
    pub outcome: Outcome,
    /// Final damage dealt. At least 1 on any landed blow.
    pub amount: f64,
    /// Damage before mitigation (after the crit multiplier, if any).
    pub base_damage: f64,
    /// How much mitigation removed.
    pub mitigated_damage: f64,
}

/// Runs one attack through hit, classification, and mitigation.
///
/// `scaling_value` is the attacker's value of the ability's scaling stat.
pub fn calculate_damage(
    ability: &AbilityDef,
    attacker: &CombatStats,
    defender: &CombatStats,
    scaling_value: f64,
    rolls: &mut dyn RollSource,
) -> DamageResult {
    let damage_type = ability
        .damage
        .as_ref()
        .map_or(DamageType::Physical, |spec| spec.damage_type);

    let base = match &ability.damage {
        Some(spec) => (spec.amount + scaling_value * spec.scaling_multiplier)
            .floor()
            .max(1.0),
        None => (attacker.attack_rating * 0.5).floor().max(1.0),
    };

    let (accuracy, evasion) = match damage_type {
        DamageType::Physical => (attacker.physical_accuracy, defender.evasion),
        DamageType::Magic => (attacker.magic_accuracy, defender.magic_evasion),
    };

    let hit_chance = (75.0 + (accuracy - 75.0) * 0.5 - evasion * 0.5).clamp(5.0, 95.0);

    if rolls.roll_percent() > hit_chance {
        return DamageResult {
            hit: false,
            outcome: Outcome::Miss,
            amount: 0.0,
            base_damage: base,
            mitigated_damage: 0.0,
        };
    }

    let (absorption, defense) = match damage_type {
        DamageType::Physical => (defender.damage_absorption, defender.defense_rating),
        DamageType::Magic => (defender.magic_absorption, defender.magic_defense),
    };

    let crit = chance_window(attacker.critical_hit_chance, 5.0);
    let glance = chance_window(defender.glancing_blow_chance, 0.0);
    let penetrating = chance_window(attacker.penetrating_blow_chance, 5.0);
    let deflected = chance_window(defender.deflected_blow_chance, 5.0);

    let outcome_roll = rolls.roll_percent();

    let (outcome, effective_base, amount) = if outcome_roll < crit {
        let boosted = (base * 1.5).floor();
        (
            Outcome::Crit,
            boosted,
            mitigate(boosted, absorption, defense, false),
        )
    } else if outcome_roll < crit + glance {
        (
            Outcome::Glance,
            base,
            mitigate(base, absorption, defense, true),
        )
    } else if outcome_roll < crit + glance + penetrating {
        (Outcome::Penetrating, base, (base - absorption).floor().max(1.0))
    } else if outcome_roll < crit + glance + penetrating + deflected {
        (
            Outcome::Deflected,
            base,
            (mitigate(base, absorption, defense, false) * 0.5)
                .floor()
                .max(1.0),
        )
    } else {
        (Outcome::Hit, base, mitigate(base, absorption, defense, false))
    };

    DamageResult {
        hit: true,
        outcome,
        amount,
        base_damage: effective_base,
        mitigated_damage: (effective_base - amount).max(0.0),
    }
}

fn chance_window(stat: f64, fallback: f64) -> f64 {
    let chance = if stat.is_finite() { stat } else { fallback };
    chance.clamp(0.0, 100.0)
}

fn mitigate(base: f64, absorption: f64, defense: f64, is_glancing: bool) -> f64 {
    let mut damage = base * if is_glancing { 0.5 } else { 1.0 };
    damage -= absorption;
    damage *= 1.0 - defense / (defense + 100.0);

    damage.floor().max(1.0)
}

#[cfg(test)]
mod tests {
    use nocturne_protocol::types::CoreStats;

    use super::*;
    use crate::derive_combat_stats;

    fn flat_stats() -> CombatStats {
        // No crit/glance/penetrate/deflect windows, perfect accuracy
        // arithmetic: hit chance stays at 75.
        CombatStats {
            attack_rating: 20.0,
            physical_accuracy: 75.0,
            critical_hit_chance: 0.0,
            penetrating_blow_chance: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn miss_when_roll_exceeds_hit_chance() {
        let ability = AbilityDef::basic_attack();
        let mut rolls = ScriptedRolls::new([80.0]);

        let result =
            calculate_damage(&ability, &flat_stats(), &flat_stats(), 10.0, &mut rolls);

        assert!(!result.hit);
        assert_eq!(result.outcome, Outcome::Miss);
        assert_eq!(result.amount, 0.0);
    }

    #[test]
    fn plain_hit_applies_mitigation() {
        let ability = AbilityDef::basic_attack();
        let attacker = flat_stats();
        let defender = CombatStats {
            damage_absorption: 2.0,
            defense_rating: 100.0,
            ..flat_stats()
        };
        let mut rolls = ScriptedRolls::new([10.0, 99.0]);

        let result = calculate_damage(&ability, &attacker, &defender, 10.0, &mut rolls);

        // base = floor(5 + 10 * 0.5) = 10; (10 - 2) * (1 - 100/200) = 4.
        assert_eq!(result.outcome, Outcome::Hit);
        assert_eq!(result.base_damage, 10.0);
        assert_eq!(result.amount, 4.0);
        assert_eq!(result.mitigated_damage, 6.0);
    }

    #[test]
    fn crit_multiplies_base_before_mitigation() {
        let ability = AbilityDef::basic_attack();
        let attacker = CombatStats {
            critical_hit_chance: 50.0,
            ..flat_stats()
        };
        let mut rolls = ScriptedRolls::new([10.0, 0.0]);

        let result = calculate_damage(&ability, &attacker, &flat_stats(), 10.0, &mut rolls);

        assert_eq!(result.outcome, Outcome::Crit);
        assert_eq!(result.base_damage, 15.0);
        assert_eq!(result.amount, 15.0);
    }

    #[test]
    fn glance_halves_before_mitigation() {
        let ability = AbilityDef::basic_attack();
        let defender = CombatStats {
            glancing_blow_chance: 100.0,
            ..flat_stats()
        };
        let mut rolls = ScriptedRolls::new([10.0, 50.0]);

        let result = calculate_damage(&ability, &flat_stats(), &defender, 10.0, &mut rolls);

        assert_eq!(result.outcome, Outcome::Glance);
        assert_eq!(result.amount, 5.0);
    }

    #[test]
    fn penetrating_ignores_defense() {
        let ability = AbilityDef::basic_attack();
        let attacker = CombatStats {
            penetrating_blow_chance: 100.0,
            ..flat_stats()
        };
        let defender = CombatStats {
            damage_absorption: 3.0,
            defense_rating: 400.0,
            ..flat_stats()
        };
        let mut rolls = ScriptedRolls::new([10.0, 50.0]);

        let result = calculate_damage(&ability, &attacker, &defender, 10.0, &mut rolls);

        assert_eq!(result.outcome, Outcome::Penetrating);
        assert_eq!(result.amount, 7.0);
    }

    #[test]
    fn deflected_halves_after_mitigation() {
        let ability = AbilityDef::basic_attack();
        let defender = CombatStats {
            deflected_blow_chance: 100.0,
            ..flat_stats()
        };
        let mut rolls = ScriptedRolls::new([10.0, 50.0]);

        let result = calculate_damage(&ability, &flat_stats(), &defender, 10.0, &mut rolls);

        assert_eq!(result.outcome, Outcome::Deflected);
        assert_eq!(result.amount, 5.0);
    }

    #[test]
    fn landed_blows_deal_at_least_one() {
        let ability = AbilityDef::basic_attack();
        let defender = CombatStats {
            damage_absorption: 1_000.0,
            defense_rating: 1_000.0,
            ..flat_stats()
        };
        let mut rolls = ScriptedRolls::new([10.0, 99.0]);

        let result = calculate_damage(&ability, &flat_stats(), &defender, 0.0, &mut rolls);

        assert_eq!(result.amount, 1.0);
    }

    #[test]
    fn hit_chance_clamps_to_bounds() {
        let ability = AbilityDef::basic_attack();

        // Evasion high enough to push the raw chance below 5.
        let dodgy = CombatStats {
            evasion: 500.0,
            ..flat_stats()
        };
        let mut rolls = ScriptedRolls::new([4.9, 99.0]);
        let result = calculate_damage(&ability, &flat_stats(), &dodgy, 0.0, &mut rolls);
        assert!(result.hit);

        // Accuracy high enough to push the raw chance above 95.
        let sharpshooter = CombatStats {
            physical_accuracy: 500.0,
            ..flat_stats()
        };
        let mut rolls = ScriptedRolls::new([95.1]);
        let result = calculate_damage(&ability, &sharpshooter, &flat_stats(), 0.0, &mut rolls);
        assert!(!result.hit);
    }

    #[test]
    fn ability_without_damage_spec_scales_from_attack_rating() {
        let mut ability = AbilityDef::basic_attack();
        ability.damage = None;

        let core = CoreStats::default();
        let attacker = derive_combat_stats(&core, 1);
        let defender = CombatStats {
            glancing_blow_chance: 0.0,
            deflected_blow_chance: 0.0,
            ..Default::default()
        };
        let mut rolls = ScriptedRolls::new([0.0, 99.0]);

        let result = calculate_damage(&ability, &attacker, &defender, 0.0, &mut rolls);

        // base = floor(21.5 * 0.5) = 10.
        assert_eq!(result.base_damage, 10.0);
    }
}
