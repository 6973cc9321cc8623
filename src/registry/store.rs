//! Room registry implementation
//!
//! The central registry that owns every live room and hands out room ids.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::protocol::{RoomListEntry, SessionDescription};

use super::config::RegistryConfig;
use super::entry::{RegistryStats, Room, RoomState};
use super::error::RegistryError;
use super::id::{ConnectionId, RoomId};

/// Shared handle to a single room
pub type RoomHandle = Arc<Mutex<Room>>;

/// Central registry for all live rooms
///
/// The map sits behind an `RwLock`; each room has its own `Mutex`, so
/// handlers working on different rooms never contend. A room lock is never
/// held while the map lock is being acquired.
pub struct RoomRegistry {
    /// Map of room id to room
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,

    /// Configuration
    config: RegistryConfig,
}

impl RoomRegistry {
    /// Create a new room registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new room registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// List all rooms as `(id, offerer description)` rows
    ///
    /// Order is not significant.
    pub async fn list_rooms(&self) -> Vec<RoomListEntry> {
        let mut entries = Vec::new();

        for handle in self.snapshot().await {
            let room = handle.lock().await;
            if !room.is_removed() {
                entries.push(room.summary());
            }
        }

        entries
    }

    /// Create a room owned by `offerer`
    ///
    /// The id is unique among live rooms. Fails with
    /// [`RegistryError::Exhausted`] if no free id turns up.
    pub async fn create_room(
        &self,
        offerer: ConnectionId,
        description: SessionDescription,
    ) -> Result<RoomId, RegistryError> {
        let mut rooms = self.rooms.write().await;

        let id = self.allocate_id(&rooms)?;
        rooms.insert(id, Arc::new(Mutex::new(Room::new(id, offerer, description))));

        tracing::info!(
            room = %id,
            offerer = %offerer,
            rooms = rooms.len(),
            "Room created"
        );

        Ok(id)
    }

    /// Draw random ids until one is free
    fn allocate_id(&self, rooms: &HashMap<RoomId, RoomHandle>) -> Result<RoomId, RegistryError> {
        let max = self.config.max_room_id;

        if rooms.len() >= max as usize {
            tracing::warn!(rooms = rooms.len(), max_room_id = max, "Room id space full");
            return Err(RegistryError::Exhausted);
        }

        let mut rng = rand::thread_rng();
        for _ in 0..self.config.max_id_attempts {
            let id = RoomId(rng.gen_range(1..=max));
            if !rooms.contains_key(&id) {
                return Ok(id);
            }
        }

        tracing::warn!(
            rooms = rooms.len(),
            attempts = self.config.max_id_attempts,
            "No free room id found"
        );
        Err(RegistryError::Exhausted)
    }

    /// Look up a room
    pub async fn get_room(&self, id: RoomId) -> Result<RoomHandle, RegistryError> {
        self.rooms
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::RoomNotFound(id))
    }

    /// Remove a room
    ///
    /// Deleting an id that is already gone returns
    /// [`RegistryError::RoomNotFound`].
    pub async fn delete_room(&self, id: RoomId) -> Result<(), RegistryError> {
        let handle = self
            .rooms
            .write()
            .await
            .remove(&id)
            .ok_or(RegistryError::RoomNotFound(id))?;

        finish_removal(&handle).await;
        Ok(())
    }

    /// Remove a room only if `offerer` created it
    ///
    /// Ids freed by cleanup are handed out again, so a stale id held by a
    /// former owner may name someone else's room. That room is left alone
    /// and [`RegistryError::RoomNotFound`] is returned.
    pub async fn delete_owned_room(
        &self,
        id: RoomId,
        offerer: ConnectionId,
    ) -> Result<(), RegistryError> {
        let handle = self.get_room(id).await?;

        {
            let room = handle.lock().await;
            if room.is_removed() || room.offerer != offerer {
                return Err(RegistryError::RoomNotFound(id));
            }
        }

        // The offerer of a room never changes, so matching the handle is
        // enough once the room lock is released.
        {
            let mut rooms = self.rooms.write().await;
            match rooms.get(&id) {
                Some(current) if Arc::ptr_eq(current, &handle) => {
                    rooms.remove(&id);
                }
                _ => return Err(RegistryError::RoomNotFound(id)),
            }
        }

        finish_removal(&handle).await;
        Ok(())
    }

    /// Clear `conn` as answerer from every room it answered
    ///
    /// Those rooms go back to pending. Returns their ids.
    pub async fn detach_answerer(&self, conn: ConnectionId) -> Vec<RoomId> {
        let mut detached = Vec::new();

        for handle in self.snapshot().await {
            let mut room = handle.lock().await;
            if !room.is_removed() && room.answerer == Some(conn) {
                room.clear_answerer();
                detached.push(room.id);

                tracing::info!(
                    room = %room.id,
                    answerer = %conn,
                    "Answerer left, room pending again"
                );
            }
        }

        detached
    }

    /// Get total number of rooms
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Count rooms by state
    pub async fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();

        for handle in self.snapshot().await {
            let room = handle.lock().await;
            if room.is_removed() {
                continue;
            }
            stats.rooms += 1;
            match room.state() {
                RoomState::Pending => stats.pending += 1,
                RoomState::Paired => stats.paired += 1,
            }
        }

        stats
    }

    /// Run cleanup task once
    ///
    /// Removes rooms that have been pending without activity for longer
    /// than `pending_room_timeout`. Rooms busy in a handler are skipped.
    /// Returns the number of rooms removed.
    pub async fn cleanup(&self) -> usize {
        let Some(timeout) = self.config.pending_room_timeout else {
            return 0;
        };

        let mut rooms = self.rooms.write().await;
        let now = Instant::now();

        let stale: Vec<(RoomId, OwnedMutexGuard<Room>)> = rooms
            .iter()
            .filter_map(|(id, handle)| {
                // Never wait on a room while holding the map lock
                let room = Arc::clone(handle).try_lock_owned().ok()?;
                let expired = room.state() == RoomState::Pending
                    && now.duration_since(room.last_activity) > timeout;
                expired.then_some((*id, room))
            })
            .collect();

        let removed = stale.len();
        for (id, mut room) in stale {
            rooms.remove(&id);
            room.mark_removed();
            tracing::info!(room = %id, offerer = %room.offerer, "Room removed by cleanup");
        }

        removed
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = registry.cleanup().await;
                if removed > 0 {
                    let stats = registry.stats().await;
                    tracing::debug!(
                        removed = removed,
                        rooms = stats.rooms,
                        pending = stats.pending,
                        paired = stats.paired,
                        "Cleanup pass"
                    );
                }
            }
        })
    }

    /// Clone out every room handle so the map lock is released before any
    /// room lock is taken
    async fn snapshot(&self) -> Vec<RoomHandle> {
        self.rooms.read().await.values().cloned().collect()
    }
}

/// Mark a room already taken out of the map as removed
async fn finish_removal(handle: &RoomHandle) {
    let mut room = handle.lock().await;
    room.mark_removed();

    tracing::info!(
        room = %room.id,
        offerer = %room.offerer,
        state = ?room.state(),
        age_ms = room.created_at.elapsed().as_millis() as u64,
        offerer_candidates = room.offerer_candidates.len(),
        answerer_candidates = room.answerer_candidates.len(),
        "Room deleted"
    );
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
