use std::sync::Arc;

use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;
use parking_lot::Mutex;
use watchparty_core::Id;

use crate::util::epoch_ms;

pub type ConnectionId = Id<Session>;

/// A connected user. One session per socket, created on connect and
/// discarded on disconnect. The username arrives later, with the first
/// create or join request.
#[derive(Debug)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub connected_at: u64,
    last_activity: AtomicCell<u64>,
    username: Mutex<Option<String>>,
    /// The room this session is currently a member of, if any.
    room_id: Mutex<Option<String>>,
}

impl Session {
    pub fn new() -> Self {
        let now = epoch_ms();

        Self {
            connection_id: ConnectionId::new(),
            connected_at: now,
            last_activity: AtomicCell::new(now),
            username: Mutex::new(None),
            room_id: Mutex::new(None),
        }
    }

    pub fn touch(&self) {
        self.last_activity.store(epoch_ms());
    }

    pub fn last_activity(&self) -> u64 {
        self.last_activity.load()
    }

    pub fn set_username(&self, username: String) {
        *self.username.lock() = Some(username);
    }

    pub fn room_id(&self) -> Option<String> {
        self.room_id.lock().clone()
    }

    pub fn set_room(&self, room_id: Option<String>) {
        *self.room_id.lock() = room_id;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// All live sessions, keyed by connection.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<ConnectionId, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.sessions
            .insert(session.connection_id, session.clone());

        session
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.get(&connection_id).map(|s| s.clone())
    }

    pub fn remove(&self, connection_id: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.remove(&connection_id).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
