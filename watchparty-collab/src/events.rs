use crossbeam::channel::{Receiver, Sender};

use crate::protocol::ServerEvent;
use crate::sessions::ConnectionId;

/// Which connections an outbound event is addressed to. Resolution to
/// actual sockets happens at the gateway, which owns the connection table.
#[derive(Debug, Clone)]
pub enum Target {
    /// A single connection, usually the origin of a request.
    Connection(ConnectionId),
    /// A resolved set of connections, usually a room's membership.
    Connections(Vec<ConnectionId>),
    /// Every connected socket, used for public room listing updates.
    All,
}

/// An event on its way out of the collab system.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub target: Target,
    pub event: ServerEvent,
}

pub type MessageSender = Sender<OutboundMessage>;
pub type MessageReceiver = Receiver<OutboundMessage>;
