use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dashmap::DashMap;
use log::info;

use crate::config::CollabConfig;
use crate::protocol::{RoomSummary, Visibility};
use crate::sessions::ConnectionId;
use crate::util::{epoch_ms, random_room_id};

mod room;

pub use room::{JoinRejection, Member, Room};

/// How often the eviction sweep wakes up.
const EVICTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// The in-memory table of live rooms.
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: DashMap<String, Arc<Room>>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        name: String,
        visibility: Visibility,
        password: Option<String>,
        host_id: ConnectionId,
    ) -> Arc<Room> {
        // Ids are short, so guard against the rare collision
        let id = loop {
            let candidate = random_room_id();

            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let room = Arc::new(Room::new(id.clone(), name, visibility, password, host_id));
        self.rooms.insert(id, room.clone());

        room
    }

    pub fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.get(room_id).map(|r| r.clone())
    }

    pub fn remove(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.remove(room_id).map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// The discoverable listing: public rooms with at least one member,
    /// busiest first.
    pub fn public_summaries(&self) -> Vec<RoomSummary> {
        let mut summaries: Vec<_> = self
            .rooms
            .iter()
            .filter(|entry| entry.visibility == Visibility::Public && !entry.is_empty())
            .map(|entry| entry.summary())
            .collect();

        summaries.sort_by(|a, b| b.user_count.cmp(&a.user_count).then(a.id.cmp(&b.id)));
        summaries
    }

    /// Removes rooms that have sat empty past the grace window and
    /// returns their ids.
    pub fn evict_idle(&self, now: u64, config: &CollabConfig) -> Vec<String> {
        let evictable: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| entry.is_evictable(now, config))
            .map(|entry| entry.id.clone())
            .collect();

        for id in &evictable {
            self.rooms.remove(id);
            info!("Evicted idle room {}", id);
        }

        evictable
    }
}

/// Spawns the background sweep that removes abandoned rooms.
pub fn spawn_eviction_thread<F>(store: Arc<RoomStore>, config: CollabConfig, on_evicted: F)
where
    F: Fn(Vec<String>) + Send + 'static,
{
    thread::Builder::new()
        .name("room-eviction".to_string())
        .spawn(move || loop {
            thread::sleep(EVICTION_SWEEP_INTERVAL);

            let evicted = store.evict_idle(epoch_ms(), &config);

            if !evicted.is_empty() {
                on_evicted(evicted);
            }
        })
        .expect("eviction thread spawns");
}
