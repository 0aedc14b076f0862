//! Proximity roster structures and their delta encoding.
//!
//! A roster is one entity's view of its surroundings over seven concentric
//! range bands. Deltas carry only what changed; applying a delta to the
//! prior roster reproduces the new one exactly.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{EntityId, EntityKind};

/// The seven range bands, innermost first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeBand {
    Touch,
    Say,
    Shout,
    Emote,
    See,
    Hear,
    Cfh,
}

impl RangeBand {
    pub const ALL: [RangeBand; 7] = [
        RangeBand::Touch,
        RangeBand::Say,
        RangeBand::Shout,
        RangeBand::Emote,
        RangeBand::See,
        RangeBand::Hear,
        RangeBand::Cfh,
    ];

    /// Band radius in metres, converted from the game's foot-denominated
    /// ranges (5/20/150/150/150/150/250).
    pub fn range_meters(self) -> f64 {
        match self {
            RangeBand::Touch => 1.524,
            RangeBand::Say => 6.096,
            RangeBand::Shout | RangeBand::Emote | RangeBand::See | RangeBand::Hear => 45.72,
            RangeBand::Cfh => 76.2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RangeBand::Touch => "touch",
            RangeBand::Say => "say",
            RangeBand::Shout => "shout",
            RangeBand::Emote => "emote",
            RangeBand::See => "see",
            RangeBand::Hear => "hear",
            RangeBand::Cfh => "cfh",
        }
    }
}

/// One observed entity inside a band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    /// Compass bearing from the observer, 0 = north, clockwise.
    pub bearing: u16,
    /// Elevation angle from the observer, −90..=90.
    pub elevation: i16,
    /// Distance in metres, 2-decimal rounded.
    pub range: f64,
}

/// One band of a roster.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityChannel {
    pub entities: Vec<RosterEntity>,
    pub count: usize,
    /// Present iff `count` ∈ {1, 2, 3}: the names of everyone in the band.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Vec<String>>,
    /// Present iff `sample` is and someone in it spoke to the observer
    /// within the last 30 seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_speaker: Option<String>,
}

/// A full roster for one observer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityRoster {
    pub channels: BTreeMap<RangeBand, ProximityChannel>,
    /// Whether the observer is currently in combat. Gates `cfh` usage.
    pub danger_state: bool,
}

/// A sparse update for one entity whose geometry changed. Only the changed
/// fields are present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntityUpdate {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearing: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<f64>,
}

/// Changes to one band. Absent fields are unchanged; for `sample` and
/// `lastSpeaker` an explicit `null` encodes "cleared".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDelta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<RosterEntity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated: Vec<RosterEntityUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub sample: Option<Option<Vec<String>>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub last_speaker: Option<Option<String>>,
}

impl ChannelDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.updated.is_empty()
            && self.count.is_none()
            && self.sample.is_none()
            && self.last_speaker.is_none()
    }
}

/// A roster delta. Channels with no changes are omitted entirely.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityRosterDelta {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channels: BTreeMap<RangeBand, ChannelDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub danger_state: Option<bool>,
}

impl ProximityRosterDelta {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.danger_state.is_none()
    }
}

/// Distinguishes an absent field from an explicit `null` during
/// deserialization: absent stays `None` via `default`, `null` becomes
/// `Some(None)`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
