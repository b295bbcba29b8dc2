// Event relay: turns inbound connection events into registry mutations and fan-out.

use crate::domain::{Clock, ConnectionId, PlayerUpdate, Position, SessionRegistry, Skin};
use crate::domain::player::DEFAULT_ANIMATION;
use crate::use_cases::rate_limit::MovementRateLimiter;
use crate::use_cases::types::{
    DropReason, MovementUpdate, Outbox, Outcome, RelayEvent, ServerEvent, WorldSnapshot,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const LOG_THROTTLE: Duration = Duration::from_secs(2);
// How often lagged receivers are offered a fresh snapshot when the world is otherwise quiet.
const RESYNC_INTERVAL: Duration = Duration::from_millis(100);

/// Shared configuration for the relay and the channels around it.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Capacity for inbound events flowing into the relay task.
    pub input_channel_capacity: usize,
    /// Capacity of each connection's outbound queue.
    pub outbox_capacity: usize,
    /// Minimum spacing between accepted movement updates of one connection.
    pub min_update_interval: Duration,
}

struct Peer {
    outbox: Outbox,
    // An event could not be queued for this peer; only a fresh snapshot clears it.
    lagged: bool,
}

/// Owns the registry and every connection's outbox. Exactly one task drives it.
pub struct Relay<C> {
    registry: SessionRegistry,
    limiter: MovementRateLimiter,
    peers: HashMap<ConnectionId, Peer>,
    // Peers whose outbox was found closed during a broadcast; reaped after it.
    closed: Vec<ConnectionId>,
    clock: C,
    last_full_log: Option<Instant>,
}

impl<C: Clock> Relay<C> {
    pub fn new(settings: &RelaySettings, clock: C) -> Self {
        Self {
            registry: SessionRegistry::new(),
            limiter: MovementRateLimiter::new(settings.min_update_interval),
            peers: HashMap::new(),
            closed: Vec::new(),
            clock,
            last_full_log: None,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// True while the connection has missed events and waits for a resync snapshot.
    pub fn is_lagged(&self, id: ConnectionId) -> bool {
        self.peers.get(&id).is_some_and(|peer| peer.lagged)
    }

    pub fn handle(&mut self, event: RelayEvent) -> Outcome {
        match event {
            RelayEvent::Connect { id, outbox } => self.connect(id, outbox),
            RelayEvent::Movement { id, update } => self.movement(id, update),
            RelayEvent::SkinChange { id, skin } => self.change_skin(id, &skin),
            RelayEvent::Disconnect { id } => self.disconnect(id),
            RelayEvent::Snapshot { reply } => {
                // The requester may have gone away; nothing to do then.
                let _ = reply.send(self.registry.snapshot());
                Outcome::Applied
            }
        }
    }

    /// Activates a connection: creates its entry, sends it the other players, announces it.
    pub fn connect(&mut self, id: ConnectionId, outbox: Outbox) -> Outcome {
        if self.peers.contains_key(&id) {
            warn!(conn_id = %id, "connection id already active; ignoring connect");
            return Outcome::Dropped(DropReason::DuplicateConnection);
        }
        let state = match self.registry.create(id) {
            Ok(state) => state,
            Err(e) => {
                warn!(conn_id = %id, error = ?e, "failed to create player entry");
                return Outcome::Dropped(DropReason::DuplicateConnection);
            }
        };
        self.peers.insert(
            id,
            Peer {
                outbox,
                lagged: false,
            },
        );

        let snapshot = snapshot_for(&self.registry, id);
        self.send_to(id, ServerEvent::WorldSnapshot(snapshot));
        self.broadcast(Some(id), ServerEvent::PlayerJoined(state));

        info!(conn_id = %id, players = self.registry.len(), "player joined");
        self.reap_closed();
        Outcome::Applied
    }

    pub fn movement(&mut self, id: ConnectionId, update: MovementUpdate) -> Outcome {
        if !self.peers.contains_key(&id) {
            return Outcome::Dropped(DropReason::UnknownConnection);
        }

        let now = self.clock.now();
        if !self.limiter.allows(id, now) {
            return Outcome::Dropped(DropReason::RateLimited);
        }

        let Some(position) = Position::new(update.x, update.y) else {
            return Outcome::Dropped(DropReason::InvalidPosition);
        };
        let skin = match update.skin.as_deref() {
            None => Skin::default(),
            Some(name) => match Skin::parse(name) {
                Some(skin) => skin,
                None => return Outcome::Dropped(DropReason::UnknownSkin),
            },
        };
        let animation_tag = update
            .animation_tag
            .unwrap_or_else(|| DEFAULT_ANIMATION.to_string());

        let state = match self.registry.update(
            id,
            PlayerUpdate {
                position: Some(position),
                animation_tag: Some(animation_tag),
                skin: Some(skin),
            },
        ) {
            Ok(state) => state,
            Err(_) => return Outcome::Dropped(DropReason::UnknownConnection),
        };
        self.limiter.record(id, now);

        self.broadcast(Some(id), ServerEvent::PlayerMoved(state));
        self.reap_closed();
        Outcome::Applied
    }

    pub fn change_skin(&mut self, id: ConnectionId, skin: &str) -> Outcome {
        if !self.peers.contains_key(&id) {
            return Outcome::Dropped(DropReason::UnknownConnection);
        }
        let Some(skin) = Skin::parse(skin) else {
            return Outcome::Dropped(DropReason::UnknownSkin);
        };

        let update = PlayerUpdate {
            skin: Some(skin),
            ..PlayerUpdate::default()
        };
        if self.registry.update(id, update).is_err() {
            return Outcome::Dropped(DropReason::UnknownConnection);
        }

        debug!(conn_id = %id, %skin, "skin changed");
        self.broadcast(Some(id), ServerEvent::SkinChanged { id, skin });
        self.reap_closed();
        Outcome::Applied
    }

    /// Removes the connection and tells everyone left. Repeated calls are no-ops.
    pub fn disconnect(&mut self, id: ConnectionId) -> Outcome {
        let outcome = self.remove_peer(id);
        self.reap_closed();
        outcome
    }

    fn remove_peer(&mut self, id: ConnectionId) -> Outcome {
        let had_peer = self.peers.remove(&id).is_some();
        let had_entry = self.registry.remove(id).is_some();
        self.limiter.forget(id);

        if !had_peer && !had_entry {
            return Outcome::Dropped(DropReason::UnknownConnection);
        }

        self.broadcast(None, ServerEvent::PlayerLeft { id });
        info!(conn_id = %id, players = self.registry.len(), "player left");
        Outcome::Applied
    }

    fn reap_closed(&mut self) {
        while let Some(id) = self.closed.pop() {
            if self.peers.contains_key(&id) {
                debug!(conn_id = %id, "outbox closed; removing connection");
                self.remove_peer(id);
            }
        }
    }

    /// Offers every lagged peer a snapshot of the current world. Returns how many caught up.
    pub fn resync_lagged(&mut self) -> usize {
        let mut recovered = 0usize;
        for (id, peer) in self.peers.iter_mut() {
            if !peer.lagged {
                continue;
            }
            let snapshot = ServerEvent::WorldSnapshot(snapshot_for(&self.registry, *id));
            match peer.outbox.try_send(Arc::new(snapshot)) {
                Ok(()) => {
                    peer.lagged = false;
                    recovered += 1;
                }
                Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => self.closed.push(*id),
            }
        }
        if recovered > 0 {
            debug!(recovered, "resynced lagged receivers");
        }
        self.reap_closed();
        recovered
    }

    fn send_to(&mut self, id: ConnectionId, event: ServerEvent) {
        let Some(peer) = self.peers.get_mut(&id) else {
            return;
        };
        match peer.outbox.try_send(Arc::new(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                peer.lagged = true;
                self.warn_full(1);
            }
            Err(TrySendError::Closed(_)) => self.closed.push(id),
        }
    }

    // Delivers to every peer except `except` without blocking. A peer whose outbox is full is
    // marked lagged and gets a snapshot instead of individual events until one fits.
    fn broadcast(&mut self, except: Option<ConnectionId>, event: ServerEvent) {
        let event = Arc::new(event);
        let mut full = 0usize;
        for (id, peer) in self.peers.iter_mut() {
            if Some(*id) == except {
                continue;
            }
            // The registry already reflects `event`, so the snapshot covers it too.
            let outgoing = if peer.lagged {
                Arc::new(ServerEvent::WorldSnapshot(snapshot_for(&self.registry, *id)))
            } else {
                event.clone()
            };
            match peer.outbox.try_send(outgoing) {
                Ok(()) => peer.lagged = false,
                Err(TrySendError::Full(_)) => {
                    peer.lagged = true;
                    full += 1;
                }
                Err(TrySendError::Closed(_)) => self.closed.push(*id),
            }
        }
        if full > 0 {
            self.warn_full(full);
        }
    }

    fn warn_full(&mut self, receivers: usize) {
        let now = self.clock.now();
        let due = self
            .last_full_log
            .is_none_or(|last| now.saturating_duration_since(last) >= LOG_THROTTLE);
        if due {
            self.last_full_log = Some(now);
            warn!(receivers, "outbox full; receivers will be resynced");
        }
    }
}

// Everyone except `id`: a client never sees itself in a snapshot.
fn snapshot_for(registry: &SessionRegistry, id: ConnectionId) -> WorldSnapshot {
    let mut snapshot = registry.snapshot();
    snapshot.remove(&id);
    snapshot
}

/// Single writer for the registry: applies relay events strictly in arrival order.
pub async fn relay_task<C: Clock>(mut input_rx: mpsc::Receiver<RelayEvent>, mut relay: Relay<C>) {
    let mut resync = tokio::time::interval(RESYNC_INTERVAL);
    resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = input_rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                if let Outcome::Dropped(reason) = relay.handle(event) {
                    debug!(?reason, "relay event dropped");
                }
            }
            _ = resync.tick() => {
                relay.resync_lagged();
            }
        }
    }
    info!("relay input closed; relay exiting");
}
