//! Per-entity combat timing: ATB gauges, cooldowns, and the idle timeout.

use nocturne_protocol::types::EntityId;
use rustc_hash::FxHashMap;

/// The gauge ceiling.
pub const ATB_MAX: f64 = 200.0;
/// Fill rate while in combat, before the attack-speed bonus.
pub const ATB_BASE_RATE: f64 = 10.0;
/// Idle time after the last hostile action before combat drops.
pub const COMBAT_TIMEOUT_MS: i64 = 15_000;

/// Timing state of one combatant, materialized on first reference.
///
/// Gauges materialize full so an opening strike is always affordable;
/// combat then drains and refills them.
#[derive(Clone, Debug)]
pub struct CombatantState {
    pub atb: f64,
    pub in_combat: bool,
    pub last_hostile_at: i64,
    /// Ability id → cooldown expiry in epoch millis.
    cooldowns: FxHashMap<String, i64>,
}

impl Default for CombatantState {
    fn default() -> Self {
        Self {
            atb: ATB_MAX,
            in_combat: false,
            last_hostile_at: 0,
            cooldowns: FxHashMap::default(),
        }
    }
}

/// Tracks every combatant in one zone. All timestamps are passed in by the
/// zone actor so the clock stays testable.
#[derive(Default)]
pub struct CombatManager {
    states: FxHashMap<EntityId, CombatantState>,
}

impl CombatManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self, id: &EntityId) -> &mut CombatantState {
        self.states.entry(id.clone()).or_default()
    }

    pub fn state(&self, id: &EntityId) -> Option<&CombatantState> {
        self.states.get(id)
    }

    pub fn is_in_combat(&self, id: &EntityId) -> bool {
        self.states.get(id).is_some_and(|state| state.in_combat)
    }

    pub fn atb(&self, id: &EntityId) -> f64 {
        self.states.get(id).map_or(ATB_MAX, |state| state.atb)
    }

    /// Puts an entity in combat. Returns whether this was a transition.
    pub fn start_combat(&mut self, id: &EntityId, now: i64) -> bool {
        let state = self.state_mut(id);
        let transitioned = !state.in_combat;

        state.in_combat = true;
        state.last_hostile_at = now;

        transitioned
    }

    pub fn record_hostile_action(&mut self, id: &EntityId, now: i64) {
        self.state_mut(id).last_hostile_at = now;
    }

    /// One tick: fills every in-combat gauge and drops combatants idle for
    /// [`COMBAT_TIMEOUT_MS`]. Returns the ids whose combat expired.
    pub fn update(
        &mut self,
        dt_seconds: f64,
        now: i64,
        attack_speed_bonus: impl Fn(&EntityId) -> f64,
    ) -> Vec<EntityId> {
        let mut expired = Vec::new();

        for (id, state) in &mut self.states {
            if !state.in_combat {
                continue;
            }

            if now - state.last_hostile_at >= COMBAT_TIMEOUT_MS {
                state.in_combat = false;
                expired.push(id.clone());
                continue;
            }

            let rate = ATB_BASE_RATE + attack_speed_bonus(id);
            state.atb = (state.atb + rate * dt_seconds).min(ATB_MAX);
        }

        expired
    }

    pub fn can_spend_atb(&self, id: &EntityId, cost: f64) -> bool {
        self.atb(id) >= cost
    }

    pub fn spend_atb(&mut self, id: &EntityId, cost: f64) {
        let state = self.state_mut(id);
        state.atb = (state.atb - cost).max(0.0);
    }

    pub fn add_atb(&mut self, id: &EntityId, amount: f64) {
        let state = self.state_mut(id);
        state.atb = (state.atb + amount).min(ATB_MAX);
    }

    /// Remaining cooldown in milliseconds; 0 when ready. Expired entries
    /// are purged on read.
    pub fn cooldown_remaining(&mut self, id: &EntityId, ability_id: &str, now: i64) -> i64 {
        let state = self.state_mut(id);

        match state.cooldowns.get(ability_id) {
            Some(&expiry) if expiry > now => expiry - now,
            Some(_) => {
                state.cooldowns.remove(ability_id);
                0
            }
            None => 0,
        }
    }

    pub fn set_cooldown(&mut self, id: &EntityId, ability_id: &str, cooldown_ms: i64, now: i64) {
        if cooldown_ms <= 0 {
            return;
        }

        self.state_mut(id)
            .cooldowns
            .insert(ability_id.to_owned(), now + cooldown_ms);
    }

    /// Drops an entity's state entirely, used when it leaves the zone.
    pub fn remove(&mut self, id: &EntityId) {
        self.states.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> EntityId {
        s.to_owned()
    }

    #[test]
    fn gauge_fills_while_in_combat_and_caps() {
        let mut manager = CombatManager::new();
        let a = id("a");

        manager.start_combat(&a, 0);
        manager.spend_atb(&a, ATB_MAX);

        manager.update(1.0, 1_000, |_| 0.0);
        assert_eq!(manager.atb(&a), 10.0);

        manager.update(1.0, 2_000, |_| 5.0);
        assert_eq!(manager.atb(&a), 25.0);

        manager.update(100.0, 3_000, |_| 0.0);
        assert_eq!(manager.atb(&a), ATB_MAX);
    }

    #[test]
    fn fresh_gauges_afford_an_opening_strike() {
        let manager = CombatManager::new();
        let a = id("a");

        assert_eq!(manager.atb(&a), ATB_MAX);
        assert!(manager.can_spend_atb(&a, 100.0));
    }

    #[test]
    fn gauge_stays_in_bounds_through_spend_and_add() {
        let mut manager = CombatManager::new();
        let a = id("a");

        manager.add_atb(&a, 500.0);
        assert_eq!(manager.atb(&a), ATB_MAX);

        manager.spend_atb(&a, 150.0);
        assert_eq!(manager.atb(&a), 50.0);

        manager.spend_atb(&a, 500.0);
        assert_eq!(manager.atb(&a), 0.0);

        assert!(!manager.can_spend_atb(&a, 1.0));
        assert!(manager.can_spend_atb(&a, 0.0));
    }

    #[test]
    fn combat_times_out_after_idle_window() {
        let mut manager = CombatManager::new();
        let a = id("a");

        assert!(manager.start_combat(&a, 0));
        assert!(!manager.start_combat(&a, 0));

        let expired = manager.update(0.05, COMBAT_TIMEOUT_MS - 1, |_| 0.0);
        assert!(expired.is_empty());
        assert!(manager.is_in_combat(&a));

        let expired = manager.update(0.05, COMBAT_TIMEOUT_MS, |_| 0.0);
        assert_eq!(expired, vec![a.clone()]);
        assert!(!manager.is_in_combat(&a));
    }

    #[test]
    fn hostile_action_refreshes_the_timeout() {
        let mut manager = CombatManager::new();
        let a = id("a");

        manager.start_combat(&a, 0);
        manager.record_hostile_action(&a, 10_000);

        let expired = manager.update(0.05, 20_000, |_| 0.0);
        assert!(expired.is_empty());

        let expired = manager.update(0.05, 25_000, |_| 0.0);
        assert_eq!(expired.len(), 1);
    }

    #[test]
    fn cooldowns_expire_exactly_on_time() {
        let mut manager = CombatManager::new();
        let a = id("a");

        manager.set_cooldown(&a, "smite", 3_000, 1_000);
        assert_eq!(manager.cooldown_remaining(&a, "smite", 2_000), 2_000);
        assert_eq!(manager.cooldown_remaining(&a, "smite", 4_000), 0);
        assert_eq!(manager.cooldown_remaining(&a, "smite", 4_000), 0);

        manager.set_cooldown(&a, "free", 0, 1_000);
        assert_eq!(manager.cooldown_remaining(&a, "free", 1_000), 0);
    }
}
