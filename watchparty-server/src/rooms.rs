use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;

use crate::context::ServerContext;
use crate::serialized::{Room, ServerStats, ToSerialized};
use crate::Router;

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    responses(
        (status = 200, body = Vec<Room>)
    )
)]
pub(crate) async fn list_rooms(State(context): State<ServerContext>) -> impl IntoResponse {
    let rooms: Vec<Room> = context
        .collab
        .context
        .rooms
        .public_summaries()
        .to_serialized();

    Json(rooms)
}

#[utoipa::path(
    get,
    path = "/v1/stats",
    tag = "stats",
    responses(
        (status = 200, body = ServerStats)
    )
)]
pub(crate) async fn stats(State(context): State<ServerContext>) -> impl IntoResponse {
    Json(ServerStats {
        connections: context.gateway.connection_count(),
        rooms: context.collab.context.rooms.len(),
    })
}

pub fn router() -> Router {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/stats", get(stats))
}
