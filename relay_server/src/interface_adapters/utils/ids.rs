use crate::domain::ConnectionId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Hands out a process-unique connection id.
///
/// The counter starts at the current time in nanoseconds so ids from a restarted process are
/// unlikely to collide with ones a client still remembers from before.
pub fn next_connection_id() -> ConnectionId {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        AtomicU64::new(seed)
    });
    ConnectionId(counter.fetch_add(1, Ordering::Relaxed))
}
