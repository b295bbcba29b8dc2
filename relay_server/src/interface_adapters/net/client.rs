use crate::domain::ConnectionId;
use crate::interface_adapters::protocol::{ClientMessage, ServerMessage, parse_client_message};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::ids::next_connection_id;
use crate::use_cases::{MovementUpdate, RelayEvent, ServerEvent};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{Instrument, debug, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    RelayClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionPhase {
    Connecting,
    Active,
    Disconnected,
}

impl ConnectionPhase {
    // Moves to the terminal phase. True if the relay holds an entry for this connection,
    // which is only the case after a successful handshake and only once.
    fn finish(&mut self) -> bool {
        let registered = *self == ConnectionPhase::Active;
        *self = ConnectionPhase::Disconnected;
        registered
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    // The transport assigns identity; it lives exactly as long as this socket.
    let id = next_connection_id();
    let span = info_span!("conn", conn_id = %id);

    async move {
        let (outbox_tx, outbox_rx) = mpsc::channel::<Arc<ServerEvent>>(state.outbox_capacity);
        let mut ctx = ConnCtx::new(id, &state, outbox_rx);

        match activate(&mut socket, &mut ctx, outbox_tx).await {
            Ok(()) => {
                info!("client connected");

                // Main Client Loop
                if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
                    warn!(error = ?e, "client loop exited with error");
                }
            }
            Err(e) => {
                warn!(error = ?e, phase = ?ctx.phase, "failed to bootstrap connection");
                let _ = socket.close().await;
            }
        }

        disconnect_cleanup(&mut ctx).await;
    }
    .instrument(span)
    .await
}

struct ConnCtx {
    pub id: ConnectionId,
    pub phase: ConnectionPhase,
    pub relay_tx: mpsc::Sender<RelayEvent>,
    // Events the relay addressed to this connection.
    pub outbox_rx: mpsc::Receiver<Arc<ServerEvent>>,
    pub max_invalid_messages: u32,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_messages: u32,
    pub dropped_movements: u64,

    pub last_invalid_log: Instant,
    pub last_relay_full_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

impl ConnCtx {
    fn new(
        id: ConnectionId,
        state: &AppState,
        outbox_rx: mpsc::Receiver<Arc<ServerEvent>>,
    ) -> Self {
        let now = Instant::now() - LOG_THROTTLE;
        Self {
            id,
            phase: ConnectionPhase::Connecting,
            relay_tx: state.relay_tx.clone(),
            outbox_rx,
            max_invalid_messages: state.max_invalid_messages,

            msgs_in: 0,
            msgs_out: 0,
            bytes_in: 0,
            bytes_out: 0,

            invalid_messages: 0,
            dropped_movements: 0,

            last_invalid_log: now,
            last_relay_full_log: now,

            close_frame: None,
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

// Connecting -> Active: tell the client who it is, then hand the connection to the relay.
async fn activate(
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
    outbox_tx: mpsc::Sender<Arc<ServerEvent>>,
) -> Result<(), NetError> {
    let bytes = send_message(socket, &ServerMessage::identity(ctx.id)).await?;
    ctx.msgs_out += 1;
    ctx.bytes_out += bytes as u64;

    // The relay replies with the world snapshot through the outbox.
    ctx.relay_tx
        .send(RelayEvent::Connect {
            id: ctx.id,
            outbox: outbox_tx,
        })
        .await
        .map_err(|_| NetError::RelayClosed)?;

    ctx.phase = ConnectionPhase::Active;
    Ok(())
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming Message from Client
            incoming = socket.recv() => {
                match handle_incoming_ws(incoming, ctx).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing relay event
            event = ctx.outbox_rx.recv() => {
                match event {
                    Some(event) => match forward_event(&event, socket, ctx).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    None => {
                        // The relay dropped our outbox; it already considers us gone.
                        warn!("relay closed outbox; disconnecting");
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;

                match parse_client_message(&text) {
                    Ok(ClientMessage::MovementUpdate(payload)) => {
                        forward_movement(ctx, payload.into())
                    }
                    Ok(ClientMessage::SkinChangeRequest(payload)) => {
                        ctx.relay_tx
                            .send(RelayEvent::SkinChange {
                                id: ctx.id,
                                skin: payload.skin,
                            })
                            .await
                            .map_err(|_| NetError::RelayClosed)?;
                        Ok(LoopControl::Continue)
                    }
                    Err(parse_err) => {
                        // Malformed input is dropped without telling the sender.
                        ctx.invalid_messages += 1;
                        if should_log(&mut ctx.last_invalid_log) {
                            warn!(
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if ctx.max_invalid_messages > 0
                            && ctx.invalid_messages > ctx.max_invalid_messages
                        {
                            ctx.close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(bytes) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += bytes.len() as u64;
                if should_log(&mut ctx.last_invalid_log) {
                    warn!(bytes = bytes.len(), "binary message ignored");
                }
                Ok(LoopControl::Continue)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!("websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

// Movement is best-effort: if the relay is backed up the update is dropped, not queued.
fn forward_movement(ctx: &mut ConnCtx, update: MovementUpdate) -> Result<LoopControl, NetError> {
    match ctx.relay_tx.try_send(RelayEvent::Movement {
        id: ctx.id,
        update,
    }) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(TrySendError::Full(_evt)) => {
            ctx.dropped_movements += 1;
            if should_log(&mut ctx.last_relay_full_log) {
                warn!("relay input full; dropping movement update");
            }
            Ok(LoopControl::Continue)
        }
        Err(TrySendError::Closed(_evt)) => Err(NetError::RelayClosed),
    }
}

async fn forward_event(
    event: &ServerEvent,
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
) -> LoopControl {
    match send_message(socket, &ServerMessage::from(event)).await {
        Ok(bytes) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send relay event");
            LoopControl::Disconnect
        }
    }
}

// Any phase -> Disconnected. Only an active connection has an entry for the relay to remove.
async fn disconnect_cleanup(ctx: &mut ConnCtx) {
    if ctx.phase.finish()
        && ctx
            .relay_tx
            .send(RelayEvent::Disconnect { id: ctx.id })
            .await
            .is_err()
    {
        warn!("relay closed before disconnect could be recorded");
    }

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_messages = ctx.invalid_messages,
        dropped_movements = ctx.dropped_movements,
        "connection stats"
    );
    info!("client disconnected");
}
