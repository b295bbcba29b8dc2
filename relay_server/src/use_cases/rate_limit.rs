// Per-connection throttle for movement updates.

use crate::domain::ConnectionId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct MovementRateLimiter {
    // Minimum spacing between two accepted updates (zero disables the limit).
    min_interval: Duration,
    // Time of the last accepted update per connection.
    last_accepted: HashMap<ConnectionId, Instant>,
}

impl MovementRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: HashMap::new(),
        }
    }

    /// Returns true if an update arriving at `now` is spaced far enough from the last accepted one.
    ///
    /// This does not record anything; call [`MovementRateLimiter::record`] once the update has
    /// actually been applied so rejected updates do not push the window forward.
    pub fn allows(&self, id: ConnectionId, now: Instant) -> bool {
        match self.last_accepted.get(&id) {
            Some(last) => now.saturating_duration_since(*last) >= self.min_interval,
            None => true,
        }
    }

    pub fn record(&mut self, id: ConnectionId, now: Instant) {
        self.last_accepted.insert(id, now);
    }

    pub fn forget(&mut self, id: ConnectionId) {
        self.last_accepted.remove(&id);
    }

    pub fn tracked(&self) -> usize {
        self.last_accepted.len()
    }
}
