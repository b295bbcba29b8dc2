use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::domain::ports::Clock;

// Shared manually advanced time source for deterministic use-case tests.
#[derive(Clone)]
pub(crate) struct ManualClock(Arc<Mutex<Instant>>);

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut guard = self.0.lock().expect("clock mutex poisoned");
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.0.lock().expect("clock mutex poisoned")
    }
}
