//! Tick-stepped position integration for entities with active movement.

use nocturne_math::{heading_between, step_along, DVec3, FEET_TO_METERS};
use nocturne_protocol::envelope::SpeedMode;
use nocturne_protocol::types::EntityId;
use rustc_hash::FxHashMap;

use crate::zone::ZoneManager;

/// Positions persist to the character store on this cadence while moving,
/// and at every stop.
pub const DB_PERSIST_INTERVAL: f64 = 1.0;

/// A fixed-position target snaps when the mover is this close.
const SNAP_DISTANCE: f64 = 0.5;

/// What a mover is walking toward.
#[derive(Clone, Debug, PartialEq)]
pub enum MovementTarget {
    /// Free movement along the current heading.
    Heading,
    /// Follow a named entity until within `range_feet`.
    Entity { name: String, range_feet: f64 },
    /// Walk to a fixed point.
    Position(DVec3),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    TargetLost,
    DistanceReached,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::TargetReached => "target_reached",
            StopReason::TargetLost => "target_lost",
            StopReason::DistanceReached => "distance_reached",
        }
    }
}

/// Emitted by [`MovementSystem::tick`] for the zone actor to act on.
#[derive(Clone, Debug, PartialEq)]
pub enum MovementEvent {
    Moved {
        entity_id: EntityId,
        position: DVec3,
    },
    /// The 1 s persist cadence elapsed for a mover.
    PersistDue {
        entity_id: EntityId,
        position: DVec3,
    },
    Stopped {
        entity_id: EntityId,
        position: DVec3,
        reason: StopReason,
    },
}

struct ActiveMovement {
    heading: f64,
    speed: SpeedMode,
    base_speed: f64,
    distance_limit: Option<f64>,
    distance_traveled: f64,
    target: MovementTarget,
    persist_elapsed: f64,
}

/// Integrates every active mover in one zone, one tick at a time.
#[derive(Default)]
pub struct MovementSystem {
    movers: FxHashMap<EntityId, ActiveMovement>,
}

impl MovementSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_moving(&self, id: &EntityId) -> bool {
        self.movers.contains_key(id)
    }

    /// Begins (or replaces) movement for an entity. `base_speed` is the
    /// agility-derived walking speed in m/s.
    pub fn start(
        &mut self,
        zone: &ZoneManager,
        id: &EntityId,
        heading: f64,
        speed: SpeedMode,
        base_speed: f64,
        target: MovementTarget,
        distance_limit: Option<f64>,
    ) {
        if zone.get_entity(id).is_none() {
            return;
        }

        self.movers.insert(
            id.clone(),
            ActiveMovement {
                heading,
                speed,
                base_speed,
                distance_limit,
                distance_traveled: 0.0,
                target,
                persist_elapsed: 0.0,
            },
        );
    }

    /// Halts an entity's movement. Returns whether it was moving.
    pub fn stop(&mut self, id: &EntityId) -> bool {
        self.movers.remove(id).is_some()
    }

    /// Advances every mover by `dt` seconds, mutating positions in the
    /// zone and reporting what happened.
    pub fn tick(&mut self, dt: f64, zone: &mut ZoneManager) -> Vec<MovementEvent> {
        let mut events = Vec::new();
        let mut finished: Vec<(EntityId, DVec3, StopReason)> = Vec::new();
        let mut lost: Vec<EntityId> = Vec::new();

        for (id, mover) in &mut self.movers {
            let Some(entity) = zone.get_entity(id) else {
                lost.push(id.clone());
                continue;
            };
            let position = entity.position;

            let speed = mover.base_speed * mover.speed.multiplier();
            let mut step = speed * dt;

            if step <= 0.0 {
                continue;
            }

            let mut stop = None;

            match &mover.target {
                MovementTarget::Position(target) => {
                    let distance = position.distance(*target);

                    if distance <= SNAP_DISTANCE {
                        finished.push((id.clone(), *target, StopReason::TargetReached));
                        continue;
                    }

                    mover.heading = heading_between(position, *target);
                    step = step.min(distance);

                    if (distance - step) <= SNAP_DISTANCE {
                        stop = Some(StopReason::TargetReached);
                    }
                }
                MovementTarget::Entity { name, range_feet } => {
                    let target = zone
                        .find_entity_by_name(name)
                        .or_else(|| zone.get_entity(&name.clone()));

                    let Some(target) = target else {
                        finished.push((id.clone(), position, StopReason::TargetLost));
                        continue;
                    };

                    let threshold = range_feet * FEET_TO_METERS;
                    let distance = position.distance(target.position);

                    if distance <= threshold {
                        finished.push((id.clone(), position, StopReason::TargetReached));
                        continue;
                    }

                    mover.heading = heading_between(position, target.position);
                    step = step.min(distance - threshold);
                }
                MovementTarget::Heading => {}
            }

            let mut moved = position + step_along(mover.heading, step);
            mover.distance_traveled += step;

            if let Some(limit) = mover.distance_limit {
                if mover.distance_traveled >= limit {
                    // Walk the overshoot back so the total comes out exact.
                    let overshoot = mover.distance_traveled - limit;
                    moved = moved - step_along(mover.heading, overshoot);
                    mover.distance_traveled = limit;
                    stop = Some(StopReason::DistanceReached);
                }
            }

            zone.update_position(id, moved);

            if let Some(reason) = stop {
                let final_position = match (&mover.target, reason) {
                    (MovementTarget::Position(target), StopReason::TargetReached) => *target,
                    _ => moved,
                };

                zone.update_position(id, final_position);
                finished.push((id.clone(), final_position, reason));
                continue;
            }

            events.push(MovementEvent::Moved {
                entity_id: id.clone(),
                position: moved,
            });

            mover.persist_elapsed += dt;
            if mover.persist_elapsed >= DB_PERSIST_INTERVAL {
                mover.persist_elapsed -= DB_PERSIST_INTERVAL;
                events.push(MovementEvent::PersistDue {
                    entity_id: id.clone(),
                    position: moved,
                });
            }
        }

        for id in lost {
            self.movers.remove(&id);
        }

        for (id, position, reason) in finished {
            self.movers.remove(&id);
            events.push(MovementEvent::Stopped {
                entity_id: id,
                position,
                reason,
            });
        }

        events
    }
}
