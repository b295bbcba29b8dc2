use crate::use_cases::RelaySettings;
use std::{env, net::IpAddr, path::PathBuf, time::Duration};

// Runtime/server constants, overridable through the environment (or a local `.env`).

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const OUTBOX_CAPACITY: usize = 256;

pub fn http_host() -> IpAddr {
    env::var("RELAY_HOST")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::from([0, 0, 0, 0]))
}

pub fn http_port() -> u16 {
    env::var("RELAY_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000)
}

pub fn min_update_interval() -> Duration {
    let millis = env::var("RELAY_MIN_UPDATE_INTERVAL_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(50);
    Duration::from_millis(millis)
}

// Directory with the browser client, served for any path not handled by the relay.
pub fn static_dir() -> PathBuf {
    env::var("RELAY_STATIC_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("public"))
}

// 0 keeps the default policy of never closing a connection for bad input.
pub fn max_invalid_messages() -> u32 {
    env::var("RELAY_MAX_INVALID_MESSAGES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// Everything the server needs besides a bound listener.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub relay: RelaySettings,
    pub static_dir: PathBuf,
    pub max_invalid_messages: u32,
}

impl ServerOptions {
    pub fn from_env() -> Self {
        Self {
            relay: RelaySettings {
                input_channel_capacity: INPUT_CHANNEL_CAPACITY,
                outbox_capacity: OUTBOX_CAPACITY,
                min_update_interval: min_update_interval(),
            },
            static_dir: static_dir(),
            max_invalid_messages: max_invalid_messages(),
        }
    }
}
