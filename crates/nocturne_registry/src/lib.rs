#![doc = include_str!("../README.md")]

use std::sync::Arc;
use std::time::Duration;

use nocturne_bus::{BusError, MessageBus};
use nocturne_protocol::types::{CharacterId, SocketId, ZoneId};
use nocturne_protocol::{keys, now_millis};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Heartbeats are refreshed on this cadence...
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// ...and expire after this long without one, declaring the server dead.
pub const HEARTBEAT_TTL_SECONDS: u64 = 15;
/// Player locations self-heal after silent client drops.
pub const PLAYER_LOCATION_TTL_SECONDS: u64 = 3600;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Ownership record for one zone. Written by the owning server at startup,
/// deleted on clean shutdown. Never TTL'd.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneAssignment {
    pub server_id: String,
    pub host: String,
    pub assigned_at: i64,
}

/// Where a character currently is, refreshed on every position update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLocation {
    pub zone_id: ZoneId,
    pub socket_id: SocketId,
    pub server_id: String,
    pub last_update: i64,
}

/// Cluster directory over the bus KV.
pub struct ZoneRegistry {
    bus: Arc<dyn MessageBus>,
    server_id: String,
    heartbeat_stop: Mutex<Option<watch::Sender<bool>>>,
}

impl ZoneRegistry {
    pub fn new(bus: Arc<dyn MessageBus>, server_id: impl Into<String>) -> Self {
        Self {
            bus,
            server_id: server_id.into(),
            heartbeat_stop: Mutex::new(None),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Starts the 5 s heartbeat task. Heartbeats are re-issued on schedule
    /// regardless of prior failures; a dead bus just means the key lapses.
    pub async fn start_heartbeat(&self) {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        if let Some(previous) = self.heartbeat_stop.lock().replace(stop_tx) {
            let _ = previous.send(true);
        }

        let bus = Arc::clone(&self.bus);
        let key = keys::heartbeat_key(&self.server_id);
        let server_id = self.server_id.clone();

        // Write one beat immediately so the server is visible before the
        // first interval elapses.
        if let Err(e) = bus
            .set_ex(&key, HEARTBEAT_TTL_SECONDS, &now_millis().to_string())
            .await
        {
            warn!(server_id, error = %e, "initial heartbeat failed");
        }

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = bus
                            .set_ex(&key, HEARTBEAT_TTL_SECONDS, &now_millis().to_string())
                            .await
                        {
                            warn!(server_id, error = %e, "heartbeat write failed");
                        }
                    }
                    _ = stop_rx.changed() => {
                        debug!(server_id, "heartbeat stopped");
                        return;
                    }
                }
            }
        });
    }

    /// Stops the heartbeat task and removes the liveness key.
    pub async fn stop_heartbeat(&self) -> Result<(), RegistryError> {
        if let Some(stop) = self.heartbeat_stop.lock().take() {
            let _ = stop.send(true);
        }

        self.bus.del(&keys::heartbeat_key(&self.server_id)).await?;

        Ok(())
    }

    pub async fn assign_zone(&self, zone_id: &ZoneId, host: &str) -> Result<(), RegistryError> {
        let assignment = ZoneAssignment {
            server_id: self.server_id.clone(),
            host: host.to_owned(),
            assigned_at: now_millis(),
        };

        self.bus
            .set(
                &keys::zone_assignment_key(zone_id),
                &serde_json::to_string(&assignment).expect("assignment serializes"),
            )
            .await?;

        debug!(zone_id, server_id = self.server_id, "zone assigned");

        Ok(())
    }

    pub async fn unassign_zone(&self, zone_id: &ZoneId) -> Result<(), RegistryError> {
        self.bus.del(&keys::zone_assignment_key(zone_id)).await?;

        Ok(())
    }

    pub async fn get_zone_assignment(
        &self,
        zone_id: &ZoneId,
    ) -> Result<Option<ZoneAssignment>, RegistryError> {
        let key = keys::zone_assignment_key(zone_id);

        self.read_record(&key).await
    }

    pub async fn get_all_zone_assignments(
        &self,
    ) -> Result<Vec<(ZoneId, ZoneAssignment)>, RegistryError> {
        let mut assignments = Vec::new();

        for key in self.bus.keys(keys::ZONE_ASSIGNMENT_KEY_PATTERN).await? {
            let Some(zone_id) = keys::trailing_id(&key, "zone:assignment:") else {
                continue;
            };

            if let Some(assignment) = self.read_record::<ZoneAssignment>(&key).await? {
                assignments.push((zone_id.to_owned(), assignment));
            }
        }

        Ok(assignments)
    }

    pub async fn get_active_servers(&self) -> Result<Vec<String>, RegistryError> {
        let keys = self.bus.keys(keys::HEARTBEAT_KEY_PATTERN).await?;

        Ok(keys
            .iter()
            .filter_map(|key| keys::trailing_id(key, "server:heartbeat:"))
            .map(str::to_owned)
            .collect())
    }

    /// Heartbeat-key existence. The TTL makes absence mean "dead or never
    /// started", which consumers treat identically.
    pub async fn is_server_alive(&self, server_id: &str) -> Result<bool, RegistryError> {
        Ok(self.bus.exists(&keys::heartbeat_key(server_id)).await?)
    }

    pub async fn update_player_location(
        &self,
        character_id: &CharacterId,
        zone_id: &ZoneId,
        socket_id: SocketId,
    ) -> Result<(), RegistryError> {
        let location = PlayerLocation {
            zone_id: zone_id.clone(),
            socket_id,
            server_id: self.server_id.clone(),
            last_update: now_millis(),
        };

        self.bus
            .set_ex(
                &keys::player_location_key(character_id),
                PLAYER_LOCATION_TTL_SECONDS,
                &serde_json::to_string(&location).expect("location serializes"),
            )
            .await?;

        Ok(())
    }

    pub async fn get_player_location(
        &self,
        character_id: &CharacterId,
    ) -> Result<Option<PlayerLocation>, RegistryError> {
        let key = keys::player_location_key(character_id);

        self.read_record(&key).await
    }

    pub async fn remove_player(&self, character_id: &CharacterId) -> Result<(), RegistryError> {
        self.bus
            .del(&keys::player_location_key(character_id))
            .await?;

        Ok(())
    }

    /// Reads and parses one KV record. A malformed record is logged and
    /// treated as absent; only bus failures surface.
    async fn read_record<T: for<'de> Deserialize<'de>>(
        &self,
        key: &str,
    ) -> Result<Option<T>, RegistryError> {
        let Some(raw) = self.bus.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(key, error = %e, "discarding malformed registry record");
                Ok(None)
            }
        }
    }
}
