// Use-case level inputs/outputs for the relay.

use crate::domain::{ConnectionId, PlayerState, Skin};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Per-connection queue of events waiting to be written to the socket.
pub type Outbox = mpsc::Sender<Arc<ServerEvent>>;

/// Current world state keyed by connection.
pub type WorldSnapshot = HashMap<ConnectionId, PlayerState>;

/// Unvalidated movement report as received from a client.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementUpdate {
    pub x: f64,
    pub y: f64,
    pub animation_tag: Option<String>,
    pub skin: Option<String>,
}

#[derive(Debug)]
pub enum RelayEvent {
    Connect { id: ConnectionId, outbox: Outbox },
    Movement { id: ConnectionId, update: MovementUpdate },
    SkinChange { id: ConnectionId, skin: String },
    Disconnect { id: ConnectionId },
    // Read-only query used by the HTTP surface.
    Snapshot { reply: oneshot::Sender<WorldSnapshot> },
}

/// Events the relay produces for connected clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    WorldSnapshot(WorldSnapshot),
    PlayerJoined(PlayerState),
    PlayerMoved(PlayerState),
    SkinChanged { id: ConnectionId, skin: Skin },
    PlayerLeft { id: ConnectionId },
}

/// Why an inbound event was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    RateLimited,
    InvalidPosition,
    UnknownSkin,
    UnknownConnection,
    DuplicateConnection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Dropped(DropReason),
}
