//! Combat scenarios: the full pipeline through the zone actor.

use nocturne_combat::ScriptedRolls;
use nocturne_protocol::envelope::{Envelope, EnvelopeKind, PlayerCombatAction};
use nocturne_protocol::now_millis;
use nocturne_store::AbilityDef;
use pretty_assertions::assert_eq;

use super::harness::TestWorld;

fn combat_action(character_id: &str, target_id: &str) -> Envelope {
    Envelope::new(EnvelopeKind::PlayerCombatAction(PlayerCombatAction {
        character_id: character_id.to_owned(),
        ability_id: None,
        target_id: Some(target_id.to_owned()),
        position: None,
    }))
}

#[tokio::test]
async fn basic_attack_spends_atb_and_lands() {
    let mut world = TestWorld::new().await;

    let (a_id, a_socket) = world.join("A", [0.0, 0.0, 0.0]).await;
    let (b_id, _b_socket) = world.join("B", [1.0, 0.0, 0.0]).await;
    world.drain_output();

    world.actor.combat_mut().spend_atb(&a_id, 50.0); // 200 → 150
    world
        .actor
        .set_roll_source(Box::new(ScriptedRolls::new([10.0, 99.0])));

    world.actor.handle_envelope(combat_action(&a_id, &b_id)).await;

    assert_eq!(world.actor.combat_mut().atb(&a_id), 50.0);
    assert!(world.actor.combat_mut().is_in_combat(&a_id));
    assert!(world.actor.combat_mut().is_in_combat(&b_id));

    let messages = world.drain_output();
    let names = TestWorld::event_names_for(&messages, a_socket);

    // combat_start for both entrants, then the action, then the hit.
    let starts = names.iter().filter(|n| *n == "combat_start").count();
    assert_eq!(starts, 2);

    let action_at = names.iter().position(|n| n == "combat_action").unwrap();
    let hit_at = names.iter().position(|n| n == "combat_hit").unwrap();
    let first_start = names.iter().position(|n| n == "combat_start").unwrap();
    assert!(first_start < action_at && action_at < hit_at);

    let hits = TestWorld::events_for(&messages, a_socket, "combat_hit");
    assert_eq!(hits.len(), 1);
    assert!(hits[0]["amount"].as_f64().unwrap() >= 1.0);
    assert_eq!(hits[0]["outcome"], "hit");

    // The victim's health dropped in the store.
    let victim = world.store_character(&b_id).await;
    assert!(victim.resources.health < victim.resources.max_health);
}

#[tokio::test]
async fn out_of_range_attack_mutates_nothing() {
    let mut world = TestWorld::new().await;

    let (a_id, a_socket) = world.join("A", [0.0, 0.0, 0.0]).await;
    let (b_id, _b_socket) = world.join("B", [5.0, 0.0, 0.0]).await;
    world.drain_output();

    world.actor.handle_envelope(combat_action(&a_id, &b_id)).await;

    let messages = world.drain_output();
    let errors = TestWorld::events_for(&messages, a_socket, "combat_error");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["reason"], "out_of_range");

    assert_eq!(world.actor.combat_mut().atb(&a_id), 200.0);
    assert!(!world.actor.combat_mut().is_in_combat(&a_id));
    assert!(TestWorld::events_for(&messages, a_socket, "combat_action").is_empty());

    let victim = world.store_character(&b_id).await;
    assert_eq!(victim.resources.health, victim.resources.max_health);
}

#[tokio::test]
async fn builder_ability_refunds_its_atb() {
    let mut world = TestWorld::new().await;

    world.store.seed_ability(AbilityDef {
        id: "gather_shadows".to_owned(),
        name: "Gather Shadows".to_owned(),
        is_builder: true,
        atb_cost: 50.0,
        cooldown: 1.0,
        ..AbilityDef::basic_attack()
    });

    let (a_id, _a_socket) = world.join("A", [0.0, 0.0, 0.0]).await;
    let (b_id, _b_socket) = world.join("B", [1.0, 0.0, 0.0]).await;
    world.drain_output();

    world.actor.combat_mut().spend_atb(&a_id, 120.0); // 200 → 80
    world
        .actor
        .set_roll_source(Box::new(ScriptedRolls::new([10.0, 99.0])));

    world
        .actor
        .handle_envelope(Envelope::new(EnvelopeKind::PlayerCombatAction(
            PlayerCombatAction {
                character_id: a_id.clone(),
                ability_id: Some("gather_shadows".to_owned()),
                target_id: Some(b_id),
                position: None,
            },
        )))
        .await;

    assert_eq!(world.actor.combat_mut().atb(&a_id), 80.0);

    let now = now_millis();
    assert!(
        world
            .actor
            .combat_mut()
            .cooldown_remaining(&a_id, "gather_shadows", now)
            > 0
    );
}

#[tokio::test]
async fn combat_times_out_into_combat_end_and_safe_rosters() {
    let mut world = TestWorld::new().await;

    let (a_id, a_socket) = world.join("A", [0.0, 0.0, 0.0]).await;
    let (b_id, _b_socket) = world.join("B", [1.0, 0.0, 0.0]).await;
    world.drain_output();

    world
        .actor
        .set_roll_source(Box::new(ScriptedRolls::new([10.0, 99.0])));
    world.actor.handle_envelope(combat_action(&a_id, &b_id)).await;

    // The fight's roster deltas flagged danger for the attacker.
    let messages = world.drain_output();
    let deltas = TestWorld::events_for(&messages, a_socket, "proximity_roster_delta");
    assert!(deltas.iter().any(|d| d["dangerState"] == true));

    // Age both combatants past the idle window, then tick.
    let stale = now_millis() - 16_000;
    world.actor.combat_mut().record_hostile_action(&a_id, stale);
    world.actor.combat_mut().record_hostile_action(&b_id, stale);

    world.actor.tick(0.05).await;

    assert!(!world.actor.combat_mut().is_in_combat(&a_id));
    assert!(!world.actor.combat_mut().is_in_combat(&b_id));

    let messages = world.drain_output();
    let ends = TestWorld::events_for(&messages, a_socket, "combat_end");
    assert_eq!(ends.len(), 2);

    let deltas = TestWorld::events_for(&messages, a_socket, "proximity_roster_delta");
    assert!(deltas.iter().any(|d| d["dangerState"] == false));
}

#[tokio::test]
async fn repeated_hits_can_kill() {
    let mut world = TestWorld::new().await;

    let (a_id, a_socket) = world.join("A", [0.0, 0.0, 0.0]).await;
    let (b_id, _b_socket) = world.join("B", [1.0, 0.0, 0.0]).await;
    world.drain_output();

    // Enough scripted always-hit rolls to chew through 100 health, and a
    // fresh gauge per swing.
    for _ in 0..40 {
        world
            .actor
            .set_roll_source(Box::new(ScriptedRolls::new([10.0, 99.0])));
        world.actor.combat_mut().add_atb(&a_id, 200.0);
        world.actor.handle_envelope(combat_action(&a_id, &b_id)).await;

        let victim = world.store_character(&b_id).await;
        if victim.resources.health == 0.0 {
            break;
        }
    }

    let victim = world.store_character(&b_id).await;
    assert_eq!(victim.resources.health, 0.0);

    let messages = world.drain_output();
    let deaths = TestWorld::events_for(&messages, a_socket, "combat_death");
    assert_eq!(deaths.len(), 1);
    assert_eq!(deaths[0]["entityId"], b_id);
}
