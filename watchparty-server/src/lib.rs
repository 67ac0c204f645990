mod context;
mod docs;
mod gateway;
mod rooms;
mod serialized;

use std::env;
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::Arc;

use axum::routing::get;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use watchparty_collab::{Collab, CollabConfig};

use context::ServerContext;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type Router = axum::Router<ServerContext>;

/// Starts the watch party server
pub async fn run_server() {
    let port = env::var("WATCHPARTY_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let config = CollabConfig {
        base_url: env::var("WATCHPARTY_BASE_URL")
            .unwrap_or_else(|_| CollabConfig::default().base_url),
        ..Default::default()
    };

    let collab = Arc::new(Collab::new(config));
    collab.start();

    let gateway = gateway::Gateway::new();
    gateway::spawn_forwarder(collab.clone(), gateway.clone());

    let context = ServerContext { collab, gateway };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .merge(rooms::router())
        .nest("/ws", gateway::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {}", port);

    axum::serve(listener, root_router.into_make_service())
        .await
        .expect("server runs");
}
