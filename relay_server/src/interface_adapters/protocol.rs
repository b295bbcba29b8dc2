// Wire protocol DTOs and conversions for the relay's WebSocket messages.
// Every frame is a JSON object `{"type": <event name>, "data": <payload>}`.

use crate::domain::{ConnectionId, PlayerState};
use crate::use_cases::{MovementUpdate, ServerEvent, WorldSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    // Assigned identity for the connection, sent before anything else.
    Identity { id: String },
    // Every other connected player, sent once right after joining.
    WorldSnapshot(HashMap<String, PlayerStateDto>),
    PlayerJoined(PlayerStateDto),
    PlayerMoved(PlayerStateDto),
    SkinChanged(SkinChangedDto),
    PlayerLeft(PlayerLeftDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(alias = "playerMovement")]
    MovementUpdate(MovementPayload),
    SkinChangeRequest(SkinChangePayload),
}

/// Position report sent by the client whenever its player moves.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementPayload {
    pub x: f64,
    pub y: f64,
    #[serde(default, alias = "anim")]
    pub animation_tag: Option<String>,
    #[serde(default)]
    pub skin: Option<String>,
}

impl From<MovementPayload> for MovementUpdate {
    fn from(payload: MovementPayload) -> Self {
        Self {
            x: payload.x,
            y: payload.y,
            animation_tag: payload.animation_tag,
            skin: payload.skin,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkinChangePayload {
    pub skin: String,
}

/// Flattened player state for wire transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateDto {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub animation_tag: String,
    pub skin: String,
}

impl From<&PlayerState> for PlayerStateDto {
    fn from(player: &PlayerState) -> Self {
        Self {
            id: player.id.to_string(),
            x: player.position.x(),
            y: player.position.y(),
            animation_tag: player.animation_tag.clone(),
            skin: player.skin.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinChangedDto {
    pub id: String,
    pub skin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeftDto {
    pub id: String,
}

pub fn snapshot_dto(snapshot: &WorldSnapshot) -> HashMap<String, PlayerStateDto> {
    snapshot
        .iter()
        .map(|(id, player)| (id.to_string(), PlayerStateDto::from(player)))
        .collect()
}

impl ServerMessage {
    pub fn identity(id: ConnectionId) -> Self {
        ServerMessage::Identity { id: id.to_string() }
    }
}

impl From<&ServerEvent> for ServerMessage {
    fn from(event: &ServerEvent) -> Self {
        match event {
            ServerEvent::WorldSnapshot(snapshot) => {
                ServerMessage::WorldSnapshot(snapshot_dto(snapshot))
            }
            ServerEvent::PlayerJoined(player) => ServerMessage::PlayerJoined(player.into()),
            ServerEvent::PlayerMoved(player) => ServerMessage::PlayerMoved(player.into()),
            ServerEvent::SkinChanged { id, skin } => ServerMessage::SkinChanged(SkinChangedDto {
                id: id.to_string(),
                skin: skin.as_str().to_string(),
            }),
            ServerEvent::PlayerLeft { id } => {
                ServerMessage::PlayerLeft(PlayerLeftDto { id: id.to_string() })
            }
        }
    }
}

/// Parses a client text frame.
///
/// Besides the enveloped form, a bare movement object (`{"x":..,"y":..,"anim":..}`) is accepted
/// for older clients that emit positions without a type tag.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, serde_json::Error> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => Ok(message),
        Err(parse_err) => serde_json::from_str::<MovementPayload>(text)
            .map(ClientMessage::MovementUpdate)
            .map_err(|_| parse_err),
    }
}
