// Framework bootstrap for the relay server runtime.

use crate::domain::SystemClock;
use crate::frameworks::config::{self, ServerOptions};
use crate::interface_adapters::net::{health_handler, players_handler, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{Relay, RelayEvent, relay_task};

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::mpsc;
use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;

// Relay lifecycle at info, everything else (hyper, tower) only when it warns.
const DEFAULT_LOG_FILTER: &str = "warn,relay_server=info";

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

// LOG_FORMAT=json switches to structured output for log shippers.
fn init_tracing() {
    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    let builder = tracing_subscriber::fmt().with_env_filter(log_filter());
    if json {
        builder.json().with_current_span(true).init();
    } else {
        builder.with_target(false).compact().init();
    }
}

fn init_runtime() {
    let _ = dotenvy::dotenv();
    init_tracing();

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Serves the relay on an already bound listener, configured from the environment.
pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    run_with_options(listener, ServerOptions::from_env()).await
}

pub async fn run_with_options(
    listener: tokio::net::TcpListener,
    options: ServerOptions,
) -> Result<()> {
    let address = listener.local_addr()?;
    let static_dir = options.static_dir.clone();
    let state = build_state(options);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/players", get(players_handler))
        .fallback_service(ServeDir::new(&static_dir))
        .with_state(state);

    tracing::info!(%address, static_dir = %static_dir.display(), "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::new(config::http_host(), config::http_port());

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state(options: ServerOptions) -> Arc<AppState> {
    // All connections feed one relay task, which is the only writer of the registry.
    let (relay_tx, relay_rx) =
        mpsc::channel::<RelayEvent>(options.relay.input_channel_capacity);
    let relay = Relay::new(&options.relay, SystemClock);
    tokio::spawn(relay_task(relay_rx, relay));

    tracing::debug!(
        min_update_interval_ms = options.relay.min_update_interval.as_millis(),
        outbox_capacity = options.relay.outbox_capacity,
        max_invalid_messages = options.max_invalid_messages,
        "relay configured"
    );

    Arc::new(AppState {
        relay_tx,
        outbox_capacity: options.relay.outbox_capacity,
        max_invalid_messages: options.max_invalid_messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_keeps_relay_logs_and_quiets_dependencies() {
        let filter = EnvFilter::new(DEFAULT_LOG_FILTER);
        let rendered = filter.to_string();
        assert!(rendered.contains("relay_server=info"));
        assert!(rendered.contains("warn"));
    }
}
