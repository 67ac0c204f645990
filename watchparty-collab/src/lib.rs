mod config;
mod coordinator;
mod events;
mod rooms;
mod sessions;
mod util;
mod video;

pub mod protocol;

use std::sync::Arc;

use crossbeam::channel::unbounded;

pub use config::CollabConfig;
pub use coordinator::{CoordinatorError, RoomCoordinator};
pub use events::{MessageReceiver, MessageSender, OutboundMessage, Target};
pub use rooms::{JoinRejection, Member, Room, RoomStore};
pub use sessions::{ConnectionId, Session, SessionRegistry};
pub use video::{extract_video_id, lookup_title, VideoError};

use events::OutboundMessage as Message;
use protocol::ServerEvent;

/// The watch party collab system, facilitating rooms, sessions, and the
/// event protocol between them.
pub struct Collab {
    pub coordinator: Arc<RoomCoordinator>,
    pub context: CollabContext,
    message_receiver: MessageReceiver,
}

/// A type passed to components of the collab system, to access state and
/// emit outbound events.
#[derive(Clone)]
pub struct CollabContext {
    pub config: Arc<CollabConfig>,
    pub rooms: Arc<RoomStore>,
    pub sessions: Arc<SessionRegistry>,

    message_sender: MessageSender,
}

impl Collab {
    pub fn new(config: CollabConfig) -> Self {
        let (message_sender, message_receiver) = unbounded();

        let context = CollabContext {
            config: Arc::new(config),
            rooms: Arc::new(RoomStore::new()),
            sessions: Arc::new(SessionRegistry::new()),
            message_sender,
        };

        let coordinator = Arc::new(RoomCoordinator::new(&context));

        Self {
            coordinator,
            context,
            message_receiver,
        }
    }

    /// Starts the background tasks of the collab system.
    pub fn start(&self) {
        let context = self.context.clone();

        rooms::spawn_eviction_thread(
            self.context.rooms.clone(),
            (*self.context.config).clone(),
            move |_| {
                context.emit_all(ServerEvent::PublicRoomsUpdate {
                    rooms: context.rooms.public_summaries(),
                });
            },
        );
    }

    /// Blocks until an outbound message is available. The gateway drains
    /// these and resolves targets to actual sockets.
    pub fn wait_for_message(&self) -> Option<OutboundMessage> {
        self.message_receiver.recv().ok()
    }

    /// Non-blocking variant, used by tests.
    pub fn try_next_message(&self) -> Option<OutboundMessage> {
        self.message_receiver.try_recv().ok()
    }
}

impl CollabContext {
    pub fn emit_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        self.dispatch(Target::Connection(connection_id), event)
    }

    pub fn emit_to_many(&self, connections: Vec<ConnectionId>, event: ServerEvent) {
        if connections.is_empty() {
            return;
        }

        self.dispatch(Target::Connections(connections), event)
    }

    pub fn emit_all(&self, event: ServerEvent) {
        self.dispatch(Target::All, event)
    }

    fn dispatch(&self, target: Target, event: ServerEvent) {
        // Failure here means the receiver is gone, which only happens
        // during shutdown
        let _ = self.message_sender.send(Message { target, event });
    }
}
