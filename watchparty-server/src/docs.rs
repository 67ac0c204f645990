use axum::response::IntoResponse;
use axum::Json;
use utoipa::OpenApi;

use crate::serialized::{Room, ServerStats};

#[derive(OpenApi)]
#[openapi(
    info(
        description = "watchparty-server exposes the watch party event gateway and a small read-only API"
    ),
    paths(crate::rooms::list_rooms, crate::rooms::stats),
    components(schemas(Room, ServerStats))
)]
pub struct ApiDoc;

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
