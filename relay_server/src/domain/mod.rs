// Domain layer: player state, the session registry and the ports they rely on.

pub mod player;
pub mod ports;
pub mod registry;

pub use player::{ConnectionId, PlayerState, PlayerUpdate, Position, SKINS, Skin};
pub use ports::{Clock, SystemClock};
pub use registry::{RegistryError, SessionRegistry};
