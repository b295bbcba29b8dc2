use std::time::Instant;

// Port for reading monotonic time, so rate limiting can be tested without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

// Wall clock backed by `Instant::now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
