use std::collections::HashMap;

use parking_lot::Mutex;

use crate::config::CollabConfig;
use crate::protocol::{
    CurrentVideo, Customization, RoomSnapshot, RoomSummary, UserSnapshot, Visibility,
};
use crate::sessions::ConnectionId;
use crate::util::{epoch_ms, random_string};

/// A member of a room. Username is captured at join time so snapshots
/// do not need to reach back into the session registry.
#[derive(Debug, Clone)]
pub struct Member {
    pub username: String,
    pub joined_at: u64,
}

#[derive(Debug)]
struct RoomData {
    host_id: ConnectionId,
    members: HashMap<ConnectionId, Member>,
    current_video: Option<CurrentVideo>,
    customization: Customization,
    last_activity: u64,
}

/// A watch party room. The id and join credentials never change after
/// creation, everything else lives behind the lock.
#[derive(Debug)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub visibility: Visibility,
    pub password: Option<String>,
    pub invite_token: String,
    pub created_at: u64,
    data: Mutex<RoomData>,
}

/// Why a join attempt was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejection {
    WrongPassword,
}

impl Room {
    pub fn new(
        id: String,
        name: String,
        visibility: Visibility,
        password: Option<String>,
        host_id: ConnectionId,
    ) -> Self {
        let now = epoch_ms();

        Self {
            id,
            name,
            visibility,
            password,
            invite_token: random_string(24),
            created_at: now,
            data: Mutex::new(RoomData {
                host_id,
                members: HashMap::new(),
                current_video: None,
                customization: Customization::default(),
                last_activity: now,
            }),
        }
    }

    /// Checks the three accepted join credentials: a matching password,
    /// a matching invite token, or being the room's designated host
    /// coming back after a reconnect.
    pub fn verify_join(
        &self,
        connection_id: ConnectionId,
        password: Option<&str>,
        invite_token: Option<&str>,
    ) -> Result<(), JoinRejection> {
        let Some(expected) = self.password.as_deref() else {
            return Ok(());
        };

        if password == Some(expected) {
            return Ok(());
        }

        if invite_token == Some(self.invite_token.as_str()) {
            return Ok(());
        }

        if self.data.lock().host_id == connection_id {
            return Ok(());
        }

        Err(JoinRejection::WrongPassword)
    }

    /// Adds a member, or refreshes them if already present. Rejoining
    /// over a reconnect must not double-count.
    pub fn add_member(&self, connection_id: ConnectionId, username: String) {
        let mut data = self.data.lock();

        data.members.insert(
            connection_id,
            Member {
                username,
                joined_at: epoch_ms(),
            },
        );

        data.last_activity = epoch_ms();
    }

    /// Removes a member. If they held host status and others remain,
    /// an arbitrary remaining member inherits it and is returned.
    pub fn remove_member(&self, connection_id: ConnectionId) -> Option<(ConnectionId, String)> {
        let mut data = self.data.lock();

        data.members.remove(&connection_id)?;
        data.last_activity = epoch_ms();

        if data.host_id != connection_id || data.members.is_empty() {
            return None;
        }

        let (new_host, member) = data
            .members
            .iter()
            .next()
            .map(|(id, member)| (*id, member.clone()))?;

        data.host_id = new_host;

        Some((new_host, member.username))
    }

    pub fn is_member(&self, connection_id: ConnectionId) -> bool {
        self.data.lock().members.contains_key(&connection_id)
    }

    pub fn is_host(&self, connection_id: ConnectionId) -> bool {
        self.data.lock().host_id == connection_id
    }

    pub fn member_username(&self, connection_id: ConnectionId) -> Option<String> {
        self.data
            .lock()
            .members
            .get(&connection_id)
            .map(|m| m.username.clone())
    }

    /// All member connection ids, the broadcast fan-out of this room.
    pub fn member_connections(&self) -> Vec<ConnectionId> {
        self.data.lock().members.keys().copied().collect()
    }

    /// Members except one, for relays that must not echo to the sender.
    pub fn member_connections_except(&self, excluded: ConnectionId) -> Vec<ConnectionId> {
        self.data
            .lock()
            .members
            .keys()
            .copied()
            .filter(|id| *id != excluded)
            .collect()
    }

    pub fn member_count(&self) -> usize {
        self.data.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().members.is_empty()
    }

    pub fn update_video(&self, video: CurrentVideo) {
        let mut data = self.data.lock();

        data.current_video = Some(video);
        data.last_activity = epoch_ms();
    }

    /// Applies an asynchronously resolved title, if the video is still
    /// the current one. No-ops otherwise.
    pub fn set_video_title(&self, video_id: &str, title: String) -> bool {
        let mut data = self.data.lock();

        match data.current_video.as_mut() {
            Some(video) if video.video_id == video_id => {
                video.title = title;
                true
            }
            _ => false,
        }
    }

    pub fn current_video(&self) -> Option<CurrentVideo> {
        self.data.lock().current_video.clone()
    }

    pub fn update_customization<F>(&self, apply: F)
    where
        F: FnOnce(&mut Customization),
    {
        let mut data = self.data.lock();

        apply(&mut data.customization);
        data.last_activity = epoch_ms();
    }

    pub fn customization(&self) -> Customization {
        self.data.lock().customization.clone()
    }

    pub fn touch(&self) {
        self.data.lock().last_activity = epoch_ms();
    }

    pub fn last_activity(&self) -> u64 {
        self.data.lock().last_activity
    }

    pub fn users(&self) -> Vec<UserSnapshot> {
        let data = self.data.lock();

        let mut users: Vec<_> = data
            .members
            .iter()
            .map(|(id, member)| UserSnapshot {
                user_id: *id,
                username: member.username.clone(),
                is_host: *id == data.host_id,
            })
            .collect();

        users.sort_by_key(|u| u.user_id.value());
        users
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        let users = self.users();
        let data = self.data.lock();

        RoomSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            visibility: self.visibility,
            current_video: data.current_video.clone(),
            customization: data.customization.clone(),
            users,
        }
    }

    pub fn summary(&self) -> RoomSummary {
        let data = self.data.lock();

        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            user_count: data.members.len(),
            has_password: self.password.is_some(),
            current_video_title: data.current_video.as_ref().map(|v| v.title.clone()),
        }
    }

    /// An empty room survives one grace window past its last activity,
    /// long enough for a host to come back from a page refresh.
    pub fn is_evictable(&self, now: u64, config: &CollabConfig) -> bool {
        let data = self.data.lock();

        data.members.is_empty()
            && now.saturating_sub(data.last_activity) >= config.empty_room_grace.num_milliseconds() as u64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_room(password: Option<&str>) -> Room {
        Room::new(
            "TESTROOM".to_string(),
            "Movie night".to_string(),
            Visibility::Private,
            password.map(str::to_string),
            ConnectionId::new(),
        )
    }

    #[test]
    fn test_join_verification_bypasses() {
        let host = ConnectionId::new();
        let stranger = ConnectionId::new();

        let room = Room::new(
            "TESTROOM".to_string(),
            "Movie night".to_string(),
            Visibility::Private,
            Some("secret".to_string()),
            host,
        );

        assert!(
            room.verify_join(stranger, Some("secret"), None).is_ok(),
            "correct password should be accepted"
        );
        assert!(
            room.verify_join(stranger, None, Some(&room.invite_token))
                .is_ok(),
            "invite token should bypass the password"
        );
        assert!(
            room.verify_join(host, None, None).is_ok(),
            "the host should be able to reconnect without credentials"
        );
        assert!(
            room.verify_join(stranger, Some("wrong"), Some("bogus"))
                .is_err(),
            "wrong credentials should be rejected"
        );
        assert!(
            room.verify_join(stranger, None, None).is_err(),
            "no credentials should be rejected"
        );
    }

    #[test]
    fn test_open_room_needs_no_credentials() {
        let room = new_room(None);
        assert!(room.verify_join(ConnectionId::new(), None, None).is_ok());
    }

    #[test]
    fn test_rejoin_is_idempotent() {
        let room = new_room(None);
        let connection = ConnectionId::new();

        room.add_member(connection, "alice".to_string());
        room.add_member(connection, "alice".to_string());

        assert_eq!(room.member_count(), 1, "rejoin should not duplicate");
    }

    #[test]
    fn test_host_transfer_on_departure() {
        let host = ConnectionId::new();
        let other = ConnectionId::new();

        let room = Room::new(
            "TESTROOM".to_string(),
            "Movie night".to_string(),
            Visibility::Public,
            None,
            host,
        );

        room.add_member(host, "alice".to_string());
        room.add_member(other, "bob".to_string());

        let transfer = room.remove_member(host);

        assert_eq!(
            transfer,
            Some((other, "bob".to_string())),
            "remaining member should inherit host status"
        );
        assert!(room.is_host(other));
    }

    #[test]
    fn test_no_transfer_when_non_host_leaves() {
        let host = ConnectionId::new();
        let other = ConnectionId::new();

        let room = Room::new(
            "TESTROOM".to_string(),
            "Movie night".to_string(),
            Visibility::Public,
            None,
            host,
        );

        room.add_member(host, "alice".to_string());
        room.add_member(other, "bob".to_string());

        assert!(room.remove_member(other).is_none());
        assert!(room.is_host(host));
    }

    #[test]
    fn test_stale_title_update_is_ignored() {
        let room = new_room(None);

        room.update_video(CurrentVideo {
            video_id: "dQw4w9WgXcQ".to_string(),
            title: "Loading...".to_string(),
            source_url: "https://youtu.be/dQw4w9WgXcQ".to_string(),
            start_offset_seconds: 0.,
            last_changed_by: "alice".to_string(),
            changed_at: epoch_ms(),
        });

        assert!(!room.set_video_title("otherVideo1", "Wrong".to_string()));
        assert!(room.set_video_title("dQw4w9WgXcQ", "Right".to_string()));
        assert_eq!(room.current_video().unwrap().title, "Right");
    }
}
