use crate::interface_adapters::http::{ErrorResponse, HealthResponse};
use crate::interface_adapters::protocol::snapshot_dto;
use crate::interface_adapters::state::AppState;
use crate::use_cases::RelayEvent;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio::sync::oneshot;

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// Current registry contents, read through the relay task so it matches what clients see.
pub async fn players_handler(State(state): State<Arc<AppState>>) -> Response {
    let (reply, reply_rx) = oneshot::channel();
    if state
        .relay_tx
        .send(RelayEvent::Snapshot { reply })
        .await
        .is_err()
    {
        return relay_unavailable();
    }

    match reply_rx.await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot_dto(&snapshot))).into_response(),
        Err(_) => relay_unavailable(),
    }
}

fn relay_unavailable() -> Response {
    tracing::error!("relay task unavailable");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "relay unavailable".to_string(),
        }),
    )
        .into_response()
}
