// Use cases layer: connection lifecycle and event relaying.

pub mod rate_limit;
pub mod relay;
#[cfg(test)]
pub(crate) mod test_support;
pub mod types;

pub use relay::{Relay, RelaySettings, relay_task};
pub use types::{
    DropReason, MovementUpdate, Outbox, Outcome, RelayEvent, ServerEvent, WorldSnapshot,
};
