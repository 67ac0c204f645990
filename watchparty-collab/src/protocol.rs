//! The application-level event contract between clients and the coordinator.
//!
//! Events are tagged by a `type` field and use camelCase names on the wire,
//! so a payload serializes as `{"type": "chatMessage", "roomId": ...}`.

use serde::{Deserialize, Serialize};
use watchparty_core::VideoActionKind;

use crate::sessions::ConnectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CustomizationKind {
    Background,
    ThemeColor,
    DanmuSpeed,
}

/// The authoritative "what should be playing" of a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentVideo {
    pub video_id: String,
    pub title: String,
    pub source_url: String,
    pub start_offset_seconds: f64,
    pub last_changed_by: String,
    pub changed_at: u64,
}

/// A room's appearance settings. Updated field by field, last writer wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customization {
    pub background: Option<String>,
    pub theme_color: String,
    pub danmu_speed: u8,
    pub last_changed_by: Option<String>,
}

impl Default for Customization {
    fn default() -> Self {
        Self {
            background: None,
            theme_color: "#667eea".to_string(),
            danmu_speed: 5,
            last_changed_by: None,
        }
    }
}

/// A member as seen by other members.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub user_id: ConnectionId,
    pub username: String,
    pub is_host: bool,
}

/// The full room state sent to a joiner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: String,
    pub name: String,
    pub visibility: Visibility,
    pub current_video: Option<CurrentVideo>,
    pub customization: Customization,
    pub users: Vec<UserSnapshot>,
}

/// The public listing entry for a discoverable room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    pub user_count: usize,
    pub has_password: bool,
    pub current_video_title: Option<String>,
}

/// Everything a client can send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    CreateRoom {
        username: String,
        room_name: String,
        visibility: Visibility,
        password: Option<String>,
    },
    JoinRoom {
        room_id: String,
        username: String,
        password: Option<String>,
        invite_token: Option<String>,
    },
    LeaveRoom,
    ChatMessage {
        room_id: String,
        text: String,
    },
    DanmuMessage {
        room_id: String,
        text: String,
        color: Option<String>,
        is_quick: Option<bool>,
    },
    ChangeVideo {
        room_id: String,
        url: String,
    },
    VideoAction {
        room_id: String,
        action: VideoActionKind,
        time: f64,
    },
    RequestSync {
        room_id: String,
    },
    SyncBroadcast {
        room_id: String,
        video_id: String,
        time: f64,
        is_playing: bool,
    },
    UpdateRoomCustomization {
        room_id: String,
        kind: CustomizationKind,
        data: serde_json::Value,
    },
    GetPublicRooms,
}

/// Everything the coordinator can send back.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    RoomCreated {
        success: bool,
        room_id: Option<String>,
        invite_link: Option<String>,
        reason: Option<String>,
    },
    JoinedRoom {
        success: bool,
        room: Option<RoomSnapshot>,
        is_host: bool,
        reason: Option<String>,
    },
    UserJoined {
        user: UserSnapshot,
    },
    UserLeft {
        user_id: ConnectionId,
        username: String,
    },
    UsersUpdate {
        users: Vec<UserSnapshot>,
    },
    PublicRoomsUpdate {
        rooms: Vec<RoomSummary>,
    },
    ChatMessage {
        username: String,
        text: String,
        timestamp: u64,
        kind: MessageKind,
    },
    DanmuMessage {
        username: String,
        text: String,
        color: String,
        is_quick: bool,
        timestamp: u64,
    },
    VideoChanged {
        video_id: String,
        url: String,
        title: String,
        start_offset: f64,
        changed_by: String,
    },
    VideoTitleUpdated {
        video_id: String,
        title: String,
    },
    VideoAction {
        action: VideoActionKind,
        time: f64,
        changed_by: String,
        timestamp: u64,
    },
    SyncRequest {
        from_user: String,
    },
    VideoSync {
        video_id: String,
        time: f64,
        is_playing: bool,
        timestamp: u64,
    },
    RoomCustomization {
        kind: CustomizationKind,
        data: serde_json::Value,
        changed_by: String,
    },
    HostTransferred {
        is_host: bool,
    },
    Error {
        message: String,
    },
}
