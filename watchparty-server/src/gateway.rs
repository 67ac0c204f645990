use std::sync::Arc;
use std::thread;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use watchparty_collab::protocol::ClientEvent;
use watchparty_collab::{Collab, ConnectionId, OutboundMessage, Target};

use crate::context::ServerContext;
use crate::Router;

/// Tracks live websocket connections and resolves outbound targets to
/// their actual sockets.
#[derive(Default)]
pub struct Gateway {
    connections: DashMap<ConnectionId, UnboundedSender<String>>,
}

impl Gateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn register(&self, connection_id: ConnectionId) -> UnboundedReceiver<String> {
        let (sender, receiver) = unbounded_channel();
        self.connections.insert(connection_id, sender);

        receiver
    }

    fn unregister(&self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
    }

    /// Serializes the event once and fans it out to the targeted sockets.
    pub fn deliver(&self, message: OutboundMessage) {
        let text = match serde_json::to_string(&message.event) {
            Ok(text) => text,
            Err(err) => {
                warn!("Failed to serialize outbound event: {}", err);
                return;
            }
        };

        match message.target {
            Target::Connection(id) => self.send_to(id, &text),
            Target::Connections(ids) => {
                for id in ids {
                    self.send_to(id, &text);
                }
            }
            Target::All => {
                for entry in self.connections.iter() {
                    let _ = entry.value().send(text.clone());
                }
            }
        }
    }

    fn send_to(&self, connection_id: ConnectionId, text: &str) {
        if let Some(sender) = self.connections.get(&connection_id) {
            // Failure means the socket task already ended
            let _ = sender.send(text.to_string());
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

/// Spawns the thread that drains collab's outbound queue into the gateway.
pub fn spawn_forwarder(collab: Arc<Collab>, gateway: Arc<Gateway>) {
    thread::Builder::new()
        .name("event-forwarder".to_string())
        .spawn(move || {
            while let Some(message) = collab.wait_for_message() {
                gateway.deliver(message);
            }
        })
        .expect("forwarder thread spawns");
}

async fn websocket(ws: WebSocketUpgrade, State(context): State<ServerContext>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, context))
}

async fn handle_socket(socket: WebSocket, context: ServerContext) {
    let (mut sink, mut stream) = socket.split();

    let connection_id = context.collab.coordinator.connect();
    let mut receiver = context.gateway.register(connection_id);

    debug!("Connection {} established", connection_id);

    let send_task = tokio::spawn(async move {
        while let Some(text) = receiver.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => context.collab.coordinator.handle(connection_id, event),
                Err(err) => debug!("Connection {} sent a malformed event: {}", connection_id, err),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    send_task.abort();

    context.gateway.unregister(connection_id);
    context.collab.coordinator.disconnect(connection_id);

    debug!("Connection {} closed", connection_id);
}

pub fn router() -> Router {
    Router::new().route("/", get(websocket))
}
