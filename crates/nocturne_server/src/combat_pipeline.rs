//! The combat action pipeline: validate, spend, roll, mitigate,
//! broadcast.

use nocturne_combat::{calculate_damage, derive_combat_stats};
use nocturne_protocol::event::{
    self, CombatActionEvent, CombatDeathEvent, CombatErrorEvent, CombatHitEvent,
    CombatMissEvent, CombatStartEvent,
};
use nocturne_protocol::now_millis;
use nocturne_protocol::types::{CombatStats, CoreStats, EntityId, EntityKind, Resources};
use nocturne_store::{AbilityDef, TargetType};
use nocturne_world::Entity;
use tracing::{debug, warn};

use crate::zone_actor::{ZoneActor, EVENT_BAND_METERS};

/// A combatant's stats and pools at the moment of use.
struct CombatSnapshot {
    core_stats: CoreStats,
    resources: Resources,
    stats: CombatStats,
    is_player: bool,
}

impl ZoneActor {
    /// Runs one ability use end to end. Every early exit emits a single
    /// `combat_error` to the observers around the attacker and leaves all
    /// state untouched.
    pub async fn execute_combat_action(
        &mut self,
        attacker_id: &EntityId,
        target_id: &EntityId,
        ability: &AbilityDef,
    ) {
        let now = now_millis();

        let Some(attacker) = self.zone().get_entity(attacker_id).cloned() else {
            return;
        };
        let Some(target) = self.zone().get_entity(target_id).cloned() else {
            self.emit_combat_error(&attacker, "no_target", "the target is gone")
                .await;
            return;
        };

        // Range gate.
        if ability.target_type != TargetType::SelfOnly {
            let distance = attacker.position.distance(target.position);

            if distance > ability.range {
                self.emit_combat_error(&attacker, "out_of_range", "target is out of range")
                    .await;
                return;
            }
        }

        // Cooldown gate.
        if self
            .combat_mut()
            .cooldown_remaining(attacker_id, &ability.id, now)
            > 0
        {
            self.emit_combat_error(&attacker, "cooldown", "that ability is still cooling down")
                .await;
            return;
        }

        // ATB gate.
        if !ability.is_free && !self.combat_mut().can_spend_atb(attacker_id, ability.atb_cost) {
            self.emit_combat_error(&attacker, "atb_low", "not enough action charge")
                .await;
            return;
        }

        let Some(attacker_snapshot) = self.combat_snapshot(&attacker).await else {
            self.emit_combat_error(&attacker, "no_combatant", "attacker record missing")
                .await;
            return;
        };
        let Some(target_snapshot) = self.combat_snapshot(&target).await else {
            self.emit_combat_error(&attacker, "no_combatant", "target record missing")
                .await;
            return;
        };

        // Resource gate. Health costs may never be lethal to the user.
        let resources = attacker_snapshot.resources;
        if ability.health_cost > 0.0 && ability.health_cost >= resources.health {
            self.emit_combat_error(&attacker, "insufficient_resources", "not enough health")
                .await;
            return;
        }
        if attacker_snapshot.is_player
            && (resources.stamina < ability.stamina_cost || resources.mana < ability.mana_cost)
        {
            self.emit_combat_error(
                &attacker,
                "insufficient_resources",
                "not enough stamina or mana",
            )
            .await;
            return;
        }

        // Pay costs.
        if ability.stamina_cost > 0.0 || ability.mana_cost > 0.0 || ability.health_cost > 0.0 {
            let paid = Resources {
                health: resources.health - ability.health_cost,
                stamina: (resources.stamina - ability.stamina_cost).max(0.0),
                mana: (resources.mana - ability.mana_cost).max(0.0),
                ..resources
            };

            self.persist_resources(&attacker, paid).await;
        }

        if !ability.is_free {
            self.combat_mut().spend_atb(attacker_id, ability.atb_cost);

            if ability.is_builder {
                self.combat_mut().add_atb(attacker_id, ability.atb_cost);
            }
        }

        self.combat_mut()
            .set_cooldown(attacker_id, &ability.id, (ability.cooldown * 1000.0) as i64, now);

        self.combat_mut().record_hostile_action(attacker_id, now);
        self.combat_mut().record_hostile_action(target_id, now);

        let attacker_entered = self.combat_mut().start_combat(attacker_id, now);
        let target_entered = self.combat_mut().start_combat(target_id, now);

        if attacker_entered || target_entered {
            for (id, entered) in [(attacker_id, attacker_entered), (target_id, target_entered)]
            {
                if !entered {
                    continue;
                }

                self.zone_set_combat_state(id, true);
                self.broadcast(
                    attacker.position,
                    EVENT_BAND_METERS,
                    event::COMBAT_START,
                    &CombatStartEvent {
                        entity_id: id.clone(),
                    },
                    None,
                )
                .await;
            }

            self.refresh_all_rosters().await;
        }

        self.broadcast(
            attacker.position,
            EVENT_BAND_METERS,
            event::COMBAT_ACTION,
            &CombatActionEvent {
                attacker_id: attacker.id.clone(),
                target_id: target.id.clone(),
                ability_id: ability.id.clone(),
                ability_name: ability.name.clone(),
            },
            None,
        )
        .await;

        let Some(damage_spec) = &ability.damage else {
            return;
        };

        let scaling = attacker_snapshot
            .core_stats
            .get(&damage_spec.scaling_stat)
            .unwrap_or(0.0);

        let result = calculate_damage(
            ability,
            &attacker_snapshot.stats,
            &target_snapshot.stats,
            scaling,
            self.roll_source(),
        );

        if !result.hit {
            self.broadcast(
                attacker.position,
                EVENT_BAND_METERS,
                event::COMBAT_MISS,
                &CombatMissEvent {
                    attacker_id: attacker.id.clone(),
                    target_id: target.id.clone(),
                    ability_id: ability.id.clone(),
                },
                None,
            )
            .await;
            return;
        }

        let new_health = (target_snapshot.resources.health - result.amount).max(0.0);

        self.persist_health(&target, new_health).await;

        self.broadcast(
            attacker.position,
            EVENT_BAND_METERS,
            event::COMBAT_HIT,
            &CombatHitEvent {
                attacker_id: attacker.id.clone(),
                target_id: target.id.clone(),
                outcome: result.outcome.as_str().to_owned(),
                amount: result.amount,
                base_damage: result.base_damage,
                mitigated_damage: result.mitigated_damage,
            },
            None,
        )
        .await;

        self.send_state_update(&target.id).await;

        if new_health <= 0.0 {
            debug!(
                target_id = target.id,
                attacker_id = attacker.id,
                "combatant died"
            );

            self.broadcast(
                attacker.position,
                EVENT_BAND_METERS,
                event::COMBAT_DEATH,
                &CombatDeathEvent {
                    entity_id: target.id.clone(),
                },
                None,
            )
            .await;
        }
    }

    /// Loads a combatant's stats and pools. Players come from the
    /// character store, companions from the companion store with stat
    /// defaults of 10.
    async fn combat_snapshot(&mut self, entity: &Entity) -> Option<CombatSnapshot> {
        let snapshot = match entity.kind {
            EntityKind::Player => {
                let character = self
                    .services()
                    .characters
                    .get(&entity.id)
                    .await
                    .ok()
                    .flatten()?;

                CombatSnapshot {
                    core_stats: character.core_stats,
                    resources: character.resources,
                    stats: derive_combat_stats(&character.core_stats, character.level),
                    is_player: true,
                }
            }
            EntityKind::Npc | EntityKind::Companion => {
                let companion = self
                    .services()
                    .companions
                    .get(&entity.id)
                    .await
                    .ok()
                    .flatten()?;
                let core_stats = companion.effective_stats();

                CombatSnapshot {
                    core_stats,
                    resources: companion.resources,
                    stats: derive_combat_stats(&core_stats, companion.level),
                    is_player: false,
                }
            }
        };

        self.cache_stats(&entity.id, snapshot.stats);

        Some(snapshot)
    }

    async fn persist_resources(&self, entity: &Entity, resources: Resources) {
        let result = match entity.kind {
            EntityKind::Player => {
                self.services()
                    .characters
                    .update_resources(&entity.id, resources)
                    .await
            }
            EntityKind::Npc | EntityKind::Companion => {
                self.services()
                    .companions
                    .update_resources(&entity.id, resources)
                    .await
            }
        };

        if let Err(e) = result {
            warn!(entity_id = entity.id, error = %e, "resource persist failed");
        }
    }

    async fn persist_health(&self, entity: &Entity, health: f64) {
        let result = match entity.kind {
            EntityKind::Player => {
                self.services()
                    .characters
                    .update_health(&entity.id, health)
                    .await
            }
            EntityKind::Npc | EntityKind::Companion => {
                self.services()
                    .companions
                    .update_health(&entity.id, health)
                    .await
            }
        };

        if let Err(e) = result {
            warn!(entity_id = entity.id, error = %e, "health persist failed");
        }
    }

    async fn emit_combat_error(&self, attacker: &Entity, reason: &str, message: &str) {
        self.broadcast(
            attacker.position,
            EVENT_BAND_METERS,
            event::COMBAT_ERROR,
            &CombatErrorEvent {
                reason: reason.to_owned(),
                message: message.to_owned(),
            },
            None,
        )
        .await;
    }
}
