use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

use crate::config::CollabConfig;
use crate::protocol::{
    ClientEvent, CurrentVideo, CustomizationKind, MessageKind, RoomSummary, ServerEvent,
    UserSnapshot, Visibility,
};
use crate::rooms::Room;
use crate::sessions::{ConnectionId, Session};
use crate::util::epoch_ms;
use crate::video::{self, VideoError};
use crate::CollabContext;

const DEFAULT_DANMU_COLOR: &str = "#ffffff";
const PENDING_TITLE: &str = "Loading title...";

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Username must be between {0} and {1} characters")]
    InvalidUsername(usize, usize),
    #[error("Room name must be between {0} and {1} characters")]
    InvalidRoomName(usize, usize),
    #[error("Room not found")]
    RoomNotFound,
    #[error("Incorrect password")]
    WrongPassword,
    #[error("You are not a member of this room")]
    NotInRoom,
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("Message is too long")]
    MessageTooLong,
    #[error("Only the host can do that")]
    HostOnly,
    #[error("{0}")]
    InvalidVideo(#[from] VideoError),
    #[error("Invalid customization value: {0}")]
    InvalidCustomization(&'static str),
}

type Result<T> = std::result::Result<T, CoordinatorError>;

/// The sole authority over room state. Every inbound event passes through
/// [RoomCoordinator::handle], which validates it, mutates the stores, and
/// decides the broadcast fan-out.
pub struct RoomCoordinator {
    context: CollabContext,
}

impl RoomCoordinator {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Registers a new connection and pushes the current public listing
    /// to it, so a landing page can render immediately.
    pub fn connect(&self) -> ConnectionId {
        let session = self.context.sessions.insert(Session::new());

        self.context.emit_to(
            session.connection_id,
            ServerEvent::PublicRoomsUpdate {
                rooms: self.context.rooms.public_summaries(),
            },
        );

        session.connection_id
    }

    /// Tears down a connection, leaving its room first.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        self.leave_current_room(connection_id);
        self.context.sessions.remove(connection_id);
    }

    /// Dispatches an inbound event. Failures are reported to the origin
    /// connection only, on the response event the request expects.
    pub fn handle(&self, connection_id: ConnectionId, event: ClientEvent) {
        if let Some(session) = self.context.sessions.get(connection_id) {
            session.touch();
        }

        match event {
            ClientEvent::CreateRoom {
                username,
                room_name,
                visibility,
                password,
            } => {
                let result =
                    self.create_room(connection_id, username, room_name, visibility, password);

                if let Err(err) = result {
                    self.context.emit_to(
                        connection_id,
                        ServerEvent::RoomCreated {
                            success: false,
                            room_id: None,
                            invite_link: None,
                            reason: Some(err.to_string()),
                        },
                    );
                }
            }
            ClientEvent::JoinRoom {
                room_id,
                username,
                password,
                invite_token,
            } => {
                let result =
                    self.join_room(connection_id, room_id, username, password, invite_token);

                if let Err(err) = result {
                    self.context.emit_to(
                        connection_id,
                        ServerEvent::JoinedRoom {
                            success: false,
                            room: None,
                            is_host: false,
                            reason: Some(err.to_string()),
                        },
                    );
                }
            }
            other => {
                let result = match other {
                    ClientEvent::LeaveRoom => {
                        self.leave_current_room(connection_id);
                        Ok(())
                    }
                    ClientEvent::ChatMessage { room_id, text } => {
                        self.chat_message(connection_id, &room_id, text)
                    }
                    ClientEvent::DanmuMessage {
                        room_id,
                        text,
                        color,
                        is_quick,
                    } => self.danmu_message(connection_id, &room_id, text, color, is_quick),
                    ClientEvent::ChangeVideo { room_id, url } => {
                        self.change_video(connection_id, &room_id, url)
                    }
                    ClientEvent::VideoAction {
                        room_id,
                        action,
                        time,
                    } => self.video_action(connection_id, &room_id, action, time),
                    ClientEvent::RequestSync { room_id } => {
                        self.request_sync(connection_id, &room_id)
                    }
                    ClientEvent::SyncBroadcast {
                        room_id,
                        video_id,
                        time,
                        is_playing,
                    } => self.sync_broadcast(connection_id, &room_id, video_id, time, is_playing),
                    ClientEvent::UpdateRoomCustomization {
                        room_id,
                        kind,
                        data,
                    } => self.update_customization(connection_id, &room_id, kind, data),
                    ClientEvent::GetPublicRooms => {
                        self.context.emit_to(
                            connection_id,
                            ServerEvent::PublicRoomsUpdate {
                                rooms: self.context.rooms.public_summaries(),
                            },
                        );
                        Ok(())
                    }
                    ClientEvent::CreateRoom { .. } | ClientEvent::JoinRoom { .. } => {
                        unreachable!()
                    }
                };

                if let Err(err) = result {
                    self.context.emit_to(
                        connection_id,
                        ServerEvent::Error {
                            message: err.to_string(),
                        },
                    );
                }
            }
        }
    }

    fn create_room(
        &self,
        connection_id: ConnectionId,
        username: String,
        room_name: String,
        visibility: Visibility,
        password: Option<String>,
    ) -> Result<()> {
        let username = validate_username(&username)?;
        let room_name = validate_room_name(&room_name)?;
        let password = password.filter(|p| !p.is_empty());

        let session = self
            .context
            .sessions
            .get(connection_id)
            .ok_or(CoordinatorError::NotInRoom)?;

        // Switching rooms leaves the old one first
        self.leave_current_room(connection_id);

        session.set_username(username.clone());

        let room = self
            .context
            .rooms
            .create(room_name, visibility, password, connection_id);

        room.add_member(connection_id, username.clone());
        session.set_room(Some(room.id.clone()));

        info!("{} created room {}", username, room.id);

        self.context.emit_to(
            connection_id,
            ServerEvent::RoomCreated {
                success: true,
                room_id: Some(room.id.clone()),
                invite_link: Some(
                    self.context
                        .config
                        .invite_link(&room.id, &room.invite_token),
                ),
                reason: None,
            },
        );

        if room.visibility == Visibility::Public {
            self.broadcast_public_rooms();
        }

        Ok(())
    }

    fn join_room(
        &self,
        connection_id: ConnectionId,
        room_id: String,
        username: String,
        password: Option<String>,
        invite_token: Option<String>,
    ) -> Result<()> {
        let username = validate_username(&username)?;

        let session = self
            .context
            .sessions
            .get(connection_id)
            .ok_or(CoordinatorError::NotInRoom)?;

        let room = self
            .context
            .rooms
            .get(&room_id)
            .ok_or(CoordinatorError::RoomNotFound)?;

        room.verify_join(
            connection_id,
            password.as_deref(),
            invite_token.as_deref(),
        )
        .map_err(|_| CoordinatorError::WrongPassword)?;

        // Rejoining the same room must not fire departure broadcasts
        let already_member = room.is_member(connection_id);

        if !already_member && session.room_id().is_some() {
            self.leave_current_room(connection_id);
        }

        session.set_username(username.clone());
        room.add_member(connection_id, username.clone());
        session.set_room(Some(room.id.clone()));

        let is_host = room.is_host(connection_id);

        info!("{} joined room {}", username, room.id);

        self.context.emit_to(
            connection_id,
            ServerEvent::JoinedRoom {
                success: true,
                room: Some(room.snapshot()),
                is_host,
                reason: None,
            },
        );

        if !already_member {
            self.context.emit_to_many(
                room.member_connections_except(connection_id),
                ServerEvent::UserJoined {
                    user: UserSnapshot {
                        user_id: connection_id,
                        username,
                        is_host,
                    },
                },
            );

            self.broadcast_users_update(&room);

            if room.visibility == Visibility::Public {
                self.broadcast_public_rooms();
            }
        }

        Ok(())
    }

    /// Removes the connection from whatever room it is in, transferring
    /// host status and notifying the remaining members.
    fn leave_current_room(&self, connection_id: ConnectionId) {
        let Some(session) = self.context.sessions.get(connection_id) else {
            return;
        };

        let Some(room_id) = session.room_id() else {
            return;
        };

        session.set_room(None);

        let Some(room) = self.context.rooms.get(&room_id) else {
            return;
        };

        let username = room
            .member_username(connection_id)
            .unwrap_or_else(|| "Someone".to_string());

        let transfer = room.remove_member(connection_id);

        self.context.emit_to_many(
            room.member_connections(),
            ServerEvent::UserLeft {
                user_id: connection_id,
                username: username.clone(),
            },
        );

        if let Some((new_host, host_name)) = transfer {
            self.context
                .emit_to(new_host, ServerEvent::HostTransferred { is_host: true });

            self.context.emit_to_many(
                room.member_connections(),
                ServerEvent::ChatMessage {
                    username: "System".to_string(),
                    text: format!("{} is now the host", host_name),
                    timestamp: epoch_ms(),
                    kind: MessageKind::System,
                },
            );
        }

        self.broadcast_users_update(&room);

        info!("{} left room {}", username, room.id);

        if room.visibility == Visibility::Public {
            self.broadcast_public_rooms();
        }
    }

    fn chat_message(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        text: String,
    ) -> Result<()> {
        let (room, username) = self.member_of(connection_id, room_id)?;
        let text = validate_message(&text, self.context.config.max_chat_length)?;

        room.touch();

        // One authoritative echo, sender included
        self.context.emit_to_many(
            room.member_connections(),
            ServerEvent::ChatMessage {
                username,
                text,
                timestamp: epoch_ms(),
                kind: MessageKind::User,
            },
        );

        Ok(())
    }

    fn danmu_message(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        text: String,
        color: Option<String>,
        is_quick: Option<bool>,
    ) -> Result<()> {
        let (room, username) = self.member_of(connection_id, room_id)?;
        let text = validate_message(&text, self.context.config.max_danmu_length)?;

        let color = color
            .as_deref()
            .and_then(normalize_hex_color)
            .unwrap_or_else(|| DEFAULT_DANMU_COLOR.to_string());

        room.touch();

        self.context.emit_to_many(
            room.member_connections(),
            ServerEvent::DanmuMessage {
                username,
                text,
                color,
                is_quick: is_quick.unwrap_or(false),
                timestamp: epoch_ms(),
            },
        );

        Ok(())
    }

    fn change_video(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        url: String,
    ) -> Result<()> {
        let (room, username) = self.member_of(connection_id, room_id)?;
        self.require_control(&room, connection_id)?;

        let video_id = video::extract_video_id(&url)?;

        let video = CurrentVideo {
            video_id: video_id.clone(),
            title: PENDING_TITLE.to_string(),
            source_url: url.clone(),
            start_offset_seconds: 0.,
            last_changed_by: username.clone(),
            changed_at: epoch_ms(),
        };

        room.update_video(video);

        self.context.emit_to_many(
            room.member_connections(),
            ServerEvent::VideoChanged {
                video_id: video_id.clone(),
                url,
                title: PENDING_TITLE.to_string(),
                start_offset: 0.,
                changed_by: username,
            },
        );

        if room.visibility == Visibility::Public {
            self.broadcast_public_rooms();
        }

        if self.context.config.fetch_titles {
            self.spawn_title_lookup(room, video_id);
        }

        Ok(())
    }

    /// Resolves the video title in the background and applies it as a
    /// follow-up event, tolerating the video having since changed.
    fn spawn_title_lookup(&self, room: Arc<Room>, video_id: String) {
        let context = self.context.clone();

        tokio::spawn(async move {
            let title = match video::lookup_title(&video_id).await {
                Ok(title) => title,
                Err(err) => {
                    warn!("Title lookup for {} failed: {}", video_id, err);
                    return;
                }
            };

            if !room.set_video_title(&video_id, title.clone()) {
                return;
            }

            context.emit_to_many(
                room.member_connections(),
                ServerEvent::VideoTitleUpdated { video_id, title },
            );

            if room.visibility == Visibility::Public {
                context.emit_all(ServerEvent::PublicRoomsUpdate {
                    rooms: context.rooms.public_summaries(),
                });
            }
        });
    }

    fn video_action(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        action: watchparty_core::VideoActionKind,
        time: f64,
    ) -> Result<()> {
        let (room, username) = self.member_of(connection_id, room_id)?;
        self.require_control(&room, connection_id)?;

        room.touch();

        // Relayed to everyone else to avoid echo loops
        self.context.emit_to_many(
            room.member_connections_except(connection_id),
            ServerEvent::VideoAction {
                action,
                time,
                changed_by: username,
                timestamp: epoch_ms(),
            },
        );

        Ok(())
    }

    fn request_sync(&self, connection_id: ConnectionId, room_id: &str) -> Result<()> {
        let (room, username) = self.member_of(connection_id, room_id)?;

        let targets = if self.context.config.require_host_for_control {
            // Under the strict policy only the host holds authoritative state
            room.member_connections()
                .into_iter()
                .filter(|id| room.is_host(*id) && *id != connection_id)
                .collect()
        } else {
            room.member_connections_except(connection_id)
        };

        self.context
            .emit_to_many(targets, ServerEvent::SyncRequest { from_user: username });

        Ok(())
    }

    fn sync_broadcast(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        video_id: String,
        time: f64,
        is_playing: bool,
    ) -> Result<()> {
        let (room, _) = self.member_of(connection_id, room_id)?;
        self.require_control(&room, connection_id)?;

        self.context.emit_to_many(
            room.member_connections_except(connection_id),
            ServerEvent::VideoSync {
                video_id,
                time,
                is_playing,
                timestamp: epoch_ms(),
            },
        );

        Ok(())
    }

    fn update_customization(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        kind: CustomizationKind,
        data: serde_json::Value,
    ) -> Result<()> {
        let (room, username) = self.member_of(connection_id, room_id)?;
        self.require_control(&room, connection_id)?;

        let data = match kind {
            CustomizationKind::ThemeColor => {
                let color = data.as_str().and_then(normalize_hex_color).ok_or(
                    CoordinatorError::InvalidCustomization(
                        "theme color must be a 6-digit hex value",
                    ),
                )?;

                room.update_customization(|c| {
                    c.theme_color = color.clone();
                    c.last_changed_by = Some(username.clone());
                });

                serde_json::Value::String(color)
            }
            CustomizationKind::DanmuSpeed => {
                let speed = data
                    .as_u64()
                    .filter(|s| (1..=10).contains(s))
                    .ok_or(CoordinatorError::InvalidCustomization(
                        "danmu speed must be an integer from 1 to 10",
                    ))?;

                room.update_customization(|c| {
                    c.danmu_speed = speed as u8;
                    c.last_changed_by = Some(username.clone());
                });

                data
            }
            CustomizationKind::Background => {
                let background = match &data {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => Some(s.clone()),
                    _ => {
                        return Err(CoordinatorError::InvalidCustomization(
                            "background must be a string or null",
                        ))
                    }
                };

                room.update_customization(|c| {
                    c.background = background;
                    c.last_changed_by = Some(username.clone());
                });

                data
            }
        };

        self.context.emit_to_many(
            room.member_connections(),
            ServerEvent::RoomCustomization {
                kind,
                data,
                changed_by: username,
            },
        );

        Ok(())
    }

    /// Resolves a connection to a room it is a member of, along with its
    /// member username.
    fn member_of(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
    ) -> Result<(Arc<Room>, String)> {
        let room = self
            .context
            .rooms
            .get(room_id)
            .ok_or(CoordinatorError::RoomNotFound)?;

        let username = room
            .member_username(connection_id)
            .ok_or(CoordinatorError::NotInRoom)?;

        Ok((room, username))
    }

    fn require_control(&self, room: &Room, connection_id: ConnectionId) -> Result<()> {
        if self.context.config.require_host_for_control && !room.is_host(connection_id) {
            return Err(CoordinatorError::HostOnly);
        }

        Ok(())
    }

    fn broadcast_users_update(&self, room: &Room) {
        self.context.emit_to_many(
            room.member_connections(),
            ServerEvent::UsersUpdate {
                users: room.users(),
            },
        );
    }

    /// Pushes the public listing to every connection, joined or not.
    pub fn broadcast_public_rooms(&self) {
        let rooms: Vec<RoomSummary> = self.context.rooms.public_summaries();
        self.context.emit_all(ServerEvent::PublicRoomsUpdate { rooms });
    }
}

fn validate_username(username: &str) -> Result<String> {
    let (min, max) = CollabConfig::USERNAME_LENGTH;
    let trimmed = username.trim();

    if trimmed.chars().count() < min || trimmed.chars().count() > max {
        return Err(CoordinatorError::InvalidUsername(min, max));
    }

    Ok(trimmed.to_string())
}

fn validate_room_name(name: &str) -> Result<String> {
    let (min, max) = CollabConfig::ROOM_NAME_LENGTH;
    let trimmed = name.trim();

    if trimmed.chars().count() < min || trimmed.chars().count() > max {
        return Err(CoordinatorError::InvalidRoomName(min, max));
    }

    Ok(trimmed.to_string())
}

fn validate_message(text: &str, max_length: usize) -> Result<String> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err(CoordinatorError::EmptyMessage);
    }

    if trimmed.chars().count() > max_length {
        return Err(CoordinatorError::MessageTooLong);
    }

    Ok(trimmed.to_string())
}

/// Accepts a 6-hex-digit color with or without a leading `#` and returns
/// the canonical `#rrggbb` shape, so the wire carries a single format.
fn normalize_hex_color(value: &str) -> Option<String> {
    let digits = value.strip_prefix('#').unwrap_or(value);

    if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(format!("#{}", digits.to_lowercase()))
    } else {
        None
    }
}
