//! The entity table and spatial queries of one zone.

use nocturne_math::DVec3;
use nocturne_protocol::types::{EntityId, EntityKind, SocketId, ZoneId};
use nocturne_protocol::{ProximityRoster, ProximityRosterDelta};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::roster::{compute_roster, diff_rosters};

/// How long a "last speaker" is remembered for roster samples.
pub const LAST_SPEAKER_TTL_MS: i64 = 30_000;

/// One resident of a zone.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub position: DVec3,
    /// Present for players, and for companions currently inhabited by a
    /// remote controller.
    pub socket_id: Option<SocketId>,
    pub in_combat: bool,
    pub is_machine: bool,
}

struct LastSpeaker {
    name: String,
    at: i64,
}

/// Authoritative state of one zone. Mutated only by the owning zone actor.
pub struct ZoneManager {
    zone_id: ZoneId,
    entities: FxHashMap<EntityId, Entity>,
    last_speakers: FxHashMap<EntityId, LastSpeaker>,
}

impl ZoneManager {
    pub fn new(zone_id: impl Into<ZoneId>) -> Self {
        Self {
            zone_id: zone_id.into(),
            entities: FxHashMap::default(),
            last_speakers: FxHashMap::default(),
        }
    }

    pub fn zone_id(&self) -> &ZoneId {
        &self.zone_id
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Inserts a player entity. An existing entity with the same id is
    /// overwritten.
    pub fn add_player(
        &mut self,
        id: impl Into<EntityId>,
        name: impl Into<String>,
        socket_id: SocketId,
        position: DVec3,
        is_machine: bool,
    ) {
        let id = id.into();

        if self.entities.contains_key(&id) {
            debug!(zone_id = self.zone_id, entity_id = id, "overwriting entity on re-join");
        }

        self.entities.insert(
            id.clone(),
            Entity {
                id,
                name: name.into(),
                kind: EntityKind::Player,
                position,
                socket_id: Some(socket_id),
                in_combat: false,
                is_machine,
            },
        );
    }

    /// Inserts a companion entity, not yet inhabited.
    pub fn add_companion(
        &mut self,
        id: impl Into<EntityId>,
        name: impl Into<String>,
        position: DVec3,
    ) {
        let id = id.into();

        self.entities.insert(
            id.clone(),
            Entity {
                id,
                name: name.into(),
                kind: EntityKind::Companion,
                position,
                socket_id: None,
                in_combat: false,
                is_machine: true,
            },
        );
    }

    pub fn remove_player(&mut self, id: &EntityId) -> Option<Entity> {
        self.last_speakers.remove(id);
        self.entities.remove(id)
    }

    pub fn update_position(&mut self, id: &EntityId, position: DVec3) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) => {
                entity.position = position;
                true
            }
            None => false,
        }
    }

    pub fn set_entity_combat_state(&mut self, id: &EntityId, in_combat: bool) {
        if let Some(entity) = self.entities.get_mut(id) {
            entity.in_combat = in_combat;
        }
    }

    /// Binds or releases the remote controller of a companion. A bound
    /// companion joins the player broadcast set.
    pub fn set_companion_socket_id(&mut self, id: &EntityId, socket_id: Option<SocketId>) {
        if let Some(entity) = self.entities.get_mut(id) {
            if entity.kind == EntityKind::Companion {
                entity.socket_id = socket_id;
            }
        }
    }

    pub fn get_entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Case-insensitive exact name match.
    pub fn find_entity_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities
            .values()
            .find(|entity| entity.name.eq_ignore_ascii_case(name))
    }

    /// All entities within `range` metres of `origin`, nearest first.
    /// The boundary is inclusive.
    pub fn entities_in_range(
        &self,
        origin: DVec3,
        range: f64,
        exclude: Option<&EntityId>,
    ) -> Vec<(&Entity, f64)> {
        let mut hits: Vec<(&Entity, f64)> = self
            .entities
            .values()
            .filter(|entity| exclude != Some(&entity.id))
            .filter_map(|entity| {
                let distance = entity.position.distance(origin);
                (distance <= range).then_some((entity, distance))
            })
            .collect();

        hits.sort_by(|a, b| a.1.total_cmp(&b.1));

        hits
    }

    /// Socket handles of players within range, for broadcast fan-out.
    pub fn player_socket_ids_in_range(
        &self,
        origin: DVec3,
        range: f64,
        exclude: Option<&EntityId>,
    ) -> Vec<SocketId> {
        self.entities_in_range(origin, range, exclude)
            .into_iter()
            .filter(|(entity, _)| entity.kind == EntityKind::Player)
            .filter_map(|(entity, _)| entity.socket_id)
            .collect()
    }

    /// Socket handles of inhabited companions within range.
    pub fn companion_socket_ids_in_range(
        &self,
        origin: DVec3,
        range: f64,
        exclude: Option<&EntityId>,
    ) -> Vec<SocketId> {
        self.entities_in_range(origin, range, exclude)
            .into_iter()
            .filter(|(entity, _)| entity.kind == EntityKind::Companion)
            .filter_map(|(entity, _)| entity.socket_id)
            .collect()
    }

    /// Remembers who last spoke to `listener`, for roster samples.
    pub fn record_last_speaker(
        &mut self,
        listener: &EntityId,
        speaker_name: impl Into<String>,
        now: i64,
    ) {
        self.last_speakers.insert(
            listener.clone(),
            LastSpeaker {
                name: speaker_name.into(),
                at: now,
            },
        );
    }

    /// The remembered speaker, if still within the 30 s window. Expired
    /// records are purged on read.
    pub fn last_speaker(&mut self, listener: &EntityId, now: i64) -> Option<&str> {
        let expired = self
            .last_speakers
            .get(listener)
            .is_some_and(|speaker| now - speaker.at >= LAST_SPEAKER_TTL_MS);

        if expired {
            self.last_speakers.remove(listener);
        }

        self.last_speakers
            .get(listener)
            .map(|speaker| speaker.name.as_str())
    }

    /// The full seven-band roster for one observer, or `None` if the
    /// observer is not resident.
    pub fn calculate_proximity_roster(
        &mut self,
        entity_id: &EntityId,
        now: i64,
    ) -> Option<ProximityRoster> {
        let speaker = self.last_speaker(entity_id, now).map(str::to_owned);
        let observer = self.entities.get(entity_id)?;

        Some(compute_roster(self, observer, speaker.as_deref()))
    }

    /// Recomputes the roster and diffs it against `previous`. Returns
    /// `None` when nothing semantically changed.
    pub fn calculate_proximity_roster_delta(
        &mut self,
        entity_id: &EntityId,
        previous: Option<&ProximityRoster>,
        now: i64,
    ) -> Option<(ProximityRosterDelta, ProximityRoster)> {
        let roster = self.calculate_proximity_roster(entity_id, now)?;
        let delta = diff_rosters(previous, &roster)?;

        Some((delta, roster))
    }
}

#[cfg(test)]
mod tests {
    use nocturne_protocol::types::EntityKind;
    use pretty_assertions::assert_eq;

    use super::*;

    fn socket() -> SocketId {
        SocketId::random()
    }

    fn zone_with_players(positions: &[(&str, [f64; 3])]) -> ZoneManager {
        let mut zone = ZoneManager::new("test-zone");

        for (name, [x, y, z]) in positions {
            zone.add_player(
                name.to_lowercase(),
                *name,
                socket(),
                DVec3::new(*x, *y, *z),
                false,
            );
        }

        zone
    }

    #[test]
    fn range_query_sorts_nearest_first_and_includes_boundary() {
        let zone = zone_with_players(&[
            ("Ash", [10.0, 0.0, 0.0]),
            ("Briar", [3.0, 0.0, 0.0]),
            ("Coal", [5.0, 0.0, 0.0]),
        ]);

        let hits = zone.entities_in_range(DVec3::ZERO, 10.0, None);
        let names: Vec<&str> = hits.iter().map(|(e, _)| e.name.as_str()).collect();

        assert_eq!(names, vec!["Briar", "Coal", "Ash"]);

        let hits = zone.entities_in_range(DVec3::ZERO, 4.99, None);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn exclusion_and_name_lookup() {
        let zone = zone_with_players(&[("Ash", [1.0, 0.0, 0.0])]);

        assert!(zone.find_entity_by_name("ASH").is_some());
        assert!(zone.find_entity_by_name("Ashe").is_none());

        let id = "ash".to_owned();
        assert!(zone.entities_in_range(DVec3::ZERO, 10.0, Some(&id)).is_empty());
    }

    #[test]
    fn rejoin_overwrites_entity() {
        let mut zone = ZoneManager::new("test-zone");
        let first = socket();
        let second = socket();

        zone.add_player("c1", "Ash", first, DVec3::ZERO, false);
        zone.add_player("c1", "Ash", second, DVec3::new(1.0, 0.0, 0.0), false);

        assert_eq!(zone.len(), 1);
        let entity = zone.get_entity(&"c1".to_owned()).unwrap();
        assert_eq!(entity.socket_id, Some(second));
        assert_eq!(entity.position.x, 1.0);
    }

    #[test]
    fn companion_socket_binding_gates_broadcast_sets() {
        let mut zone = ZoneManager::new("test-zone");
        zone.add_companion("comp-1", "Shade", DVec3::ZERO);
        zone.add_player("c1", "Ash", socket(), DVec3::new(1.0, 0.0, 0.0), false);

        assert!(zone
            .companion_socket_ids_in_range(DVec3::ZERO, 10.0, None)
            .is_empty());
        assert_eq!(
            zone.player_socket_ids_in_range(DVec3::ZERO, 10.0, None).len(),
            1
        );

        let controller = socket();
        let comp = "comp-1".to_owned();
        zone.set_companion_socket_id(&comp, Some(controller));
        assert_eq!(
            zone.companion_socket_ids_in_range(DVec3::ZERO, 10.0, None),
            vec![controller]
        );

        zone.set_companion_socket_id(&comp, None);
        assert!(zone
            .companion_socket_ids_in_range(DVec3::ZERO, 10.0, None)
            .is_empty());

        assert_eq!(
            zone.get_entity(&comp).unwrap().kind,
            EntityKind::Companion
        );
    }

    #[test]
    fn last_speaker_expires_after_thirty_seconds() {
        let mut zone = ZoneManager::new("test-zone");
        let listener = "c1".to_owned();

        zone.record_last_speaker(&listener, "Briar", 1_000);

        assert_eq!(zone.last_speaker(&listener, 10_000), Some("Briar"));
        assert_eq!(zone.last_speaker(&listener, 1_000 + LAST_SPEAKER_TTL_MS), None);
        // Purged, not just hidden.
        assert_eq!(zone.last_speaker(&listener, 2_000), None);
    }
}
