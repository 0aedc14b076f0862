//! Roster computation and delta encoding.

use std::collections::BTreeMap;

use nocturne_math::observe;
use nocturne_protocol::roster::{
    ChannelDelta, ProximityChannel, RosterEntity, RosterEntityUpdate,
};
use nocturne_protocol::{ProximityRoster, ProximityRosterDelta, RangeBand};

use crate::zone::{Entity, ZoneManager};

/// A roster with all seven bands present and empty.
pub(crate) fn empty_roster() -> ProximityRoster {
    let mut channels = BTreeMap::new();

    for band in RangeBand::ALL {
        channels.insert(band, ProximityChannel::default());
    }

    ProximityRoster {
        channels,
        danger_state: false,
    }
}

/// Builds the full roster for `observer`. `last_speaker` is whoever spoke
/// to the observer within the last 30 s, if anyone.
pub fn compute_roster(
    zone: &ZoneManager,
    observer: &Entity,
    last_speaker: Option<&str>,
) -> ProximityRoster {
    let mut channels = BTreeMap::new();

    for band in RangeBand::ALL {
        let mut entities: Vec<RosterEntity> = zone
            .entities_in_range(observer.position, band.range_meters(), Some(&observer.id))
            .into_iter()
            .map(|(entity, _)| {
                let observation = observe(observer.position, entity.position);

                RosterEntity {
                    id: entity.id.clone(),
                    name: entity.name.clone(),
                    kind: entity.kind,
                    bearing: observation.bearing,
                    elevation: observation.elevation,
                    range: observation.range,
                }
            })
            .collect();

        // Order on the rounded wire values so applying a delta reproduces
        // the roster exactly.
        entities.sort_by(|a, b| a.range.total_cmp(&b.range).then_with(|| a.id.cmp(&b.id)));

        let count = entities.len();

        let sample = (1..=3).contains(&count).then(|| {
            entities
                .iter()
                .map(|entity| entity.name.clone())
                .collect::<Vec<_>>()
        });

        let speaker_in_sample = sample.as_ref().and_then(|names| {
            last_speaker
                .filter(|speaker| names.iter().any(|name| name == speaker))
                .map(str::to_owned)
        });

        channels.insert(
            band,
            ProximityChannel {
                entities,
                count,
                sample,
                last_speaker: speaker_in_sample,
            },
        );
    }

    ProximityRoster {
        channels,
        danger_state: observer.in_combat,
    }
}

/// Diffs `next` against `previous`. Returns `None` when nothing
/// semantically changed. With no previous roster, everything is reported
/// as added.
pub fn diff_rosters(
    previous: Option<&ProximityRoster>,
    next: &ProximityRoster,
) -> Option<ProximityRosterDelta> {
    let mut delta = ProximityRosterDelta::default();

    match previous {
        None => {
            for (band, channel) in &next.channels {
                delta.channels.insert(
                    *band,
                    ChannelDelta {
                        added: channel.entities.clone(),
                        removed: Vec::new(),
                        updated: Vec::new(),
                        count: Some(channel.count),
                        sample: channel.sample.clone().map(Some),
                        last_speaker: channel.last_speaker.clone().map(Some),
                    },
                );
            }

            delta.danger_state = Some(next.danger_state);
        }
        Some(previous) => {
            for (band, channel) in &next.channels {
                let empty = ProximityChannel::default();
                let old = previous.channels.get(band).unwrap_or(&empty);
                let channel_delta = diff_channel(old, channel);

                if !channel_delta.is_empty() {
                    delta.channels.insert(*band, channel_delta);
                }
            }

            if previous.danger_state != next.danger_state {
                delta.danger_state = Some(next.danger_state);
            }
        }
    }

    (!delta.is_empty()).then_some(delta)
}

fn diff_channel(old: &ProximityChannel, new: &ProximityChannel) -> ChannelDelta {
    let mut delta = ChannelDelta::default();

    for entity in &new.entities {
        match old.entities.iter().find(|e| e.id == entity.id) {
            None => delta.added.push(entity.clone()),
            Some(previous) => {
                let update = RosterEntityUpdate {
                    id: entity.id.clone(),
                    bearing: (previous.bearing != entity.bearing).then_some(entity.bearing),
                    elevation: (previous.elevation != entity.elevation)
                        .then_some(entity.elevation),
                    range: (previous.range != entity.range).then_some(entity.range),
                };

                if update.bearing.is_some()
                    || update.elevation.is_some()
                    || update.range.is_some()
                {
                    delta.updated.push(update);
                }
            }
        }
    }

    for entity in &old.entities {
        if !new.entities.iter().any(|e| e.id == entity.id) {
            delta.removed.push(entity.id.clone());
        }
    }

    if old.count != new.count {
        delta.count = Some(new.count);
    }

    if old.sample != new.sample {
        delta.sample = Some(new.sample.clone());
    }

    if old.last_speaker != new.last_speaker {
        delta.last_speaker = Some(new.last_speaker.clone());
    }

    delta
}

/// Reconstructs the roster a delta describes, given the roster it was
/// diffed against. The inverse of [`diff_rosters`].
pub fn apply_delta(
    previous: Option<&ProximityRoster>,
    delta: &ProximityRosterDelta,
) -> ProximityRoster {
    let mut roster = previous.cloned().unwrap_or_else(empty_roster);

    for (band, channel_delta) in &delta.channels {
        let channel = roster.channels.entry(*band).or_default();

        channel
            .entities
            .retain(|entity| !channel_delta.removed.contains(&entity.id));

        for update in &channel_delta.updated {
            if let Some(entity) = channel
                .entities
                .iter_mut()
                .find(|entity| entity.id == update.id)
            {
                if let Some(bearing) = update.bearing {
                    entity.bearing = bearing;
                }
                if let Some(elevation) = update.elevation {
                    entity.elevation = elevation;
                }
                if let Some(range) = update.range {
                    entity.range = range;
                }
            }
        }

        channel.entities.extend(channel_delta.added.iter().cloned());
        channel
            .entities
            .sort_by(|a, b| a.range.total_cmp(&b.range).then_with(|| a.id.cmp(&b.id)));

        if let Some(count) = channel_delta.count {
            channel.count = count;
        }

        if let Some(sample) = &channel_delta.sample {
            channel.sample = sample.clone();
        }

        if let Some(last_speaker) = &channel_delta.last_speaker {
            channel.last_speaker = last_speaker.clone();
        }
    }

    if let Some(danger_state) = delta.danger_state {
        roster.danger_state = danger_state;
    }

    roster
}
