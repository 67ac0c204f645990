use chrono::Duration;

/// The configuration of the collab system
#[derive(Debug, Clone)]
pub struct CollabConfig {
    /// Whether video control and customization actions are reserved for the
    /// room's host. The deployed default opens them to every member; the
    /// strict variant is a configuration away.
    pub require_host_for_control: bool,
    /// How long an empty room survives before the eviction sweep removes it.
    /// Long enough for a host to come back from a page refresh.
    pub empty_room_grace: Duration,
    /// Base URL used when building invite links.
    pub base_url: String,
    /// Longest accepted chat message, in characters.
    pub max_chat_length: usize,
    /// Longest accepted danmu message, in characters.
    pub max_danmu_length: usize,
    /// Whether video titles are resolved through the external oEmbed lookup.
    pub fetch_titles: bool,
}

impl CollabConfig {
    pub const USERNAME_LENGTH: (usize, usize) = (2, 20);
    pub const ROOM_NAME_LENGTH: (usize, usize) = (3, 50);

    /// Builds the link a member shares to invite others. The token doubles
    /// as a join credential for private rooms.
    pub fn invite_link(&self, room_id: &str, invite_token: &str) -> String {
        format!(
            "{}/room?id={}&token={}",
            self.base_url, room_id, invite_token
        )
    }
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            require_host_for_control: false,
            empty_room_grace: Duration::minutes(5),
            base_url: "http://localhost:9050".to_string(),
            max_chat_length: 500,
            max_danmu_length: 100,
            fetch_titles: true,
        }
    }
}
