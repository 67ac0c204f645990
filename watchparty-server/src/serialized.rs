use serde::Serialize;
use utoipa::ToSchema;
use watchparty_collab::protocol::RoomSummary;

/// Conversion of internal types to a version that can be serialized
/// in a response.
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    pub user_count: usize,
    pub has_password: bool,
    pub current_video_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    pub connections: usize,
    pub rooms: usize,
}

impl ToSerialized<Room> for RoomSummary {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id.clone(),
            name: self.name.clone(),
            user_count: self.user_count,
            has_password: self.has_password,
            current_video_title: self.current_video_title.clone(),
        }
    }
}

impl<T, S> ToSerialized<Vec<S>> for Vec<T>
where
    T: ToSerialized<S>,
    S: Serialize,
{
    fn to_serialized(&self) -> Vec<S> {
        self.iter().map(|i| i.to_serialized()).collect()
    }
}
