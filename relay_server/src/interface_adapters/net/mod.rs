// Network adapter modules split by client sockets vs plain HTTP routes.

pub mod client;
pub mod status;

pub use client::ws_handler;
pub use status::{health_handler, players_handler};
