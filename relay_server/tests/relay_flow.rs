mod support;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use support::{connect, expect_silence, options, recv_json, send_json, send_text, spawn_server};
use tokio_tungstenite::tungstenite::Message;

const NO_LIMIT: Duration = Duration::ZERO;

#[tokio::test]
async fn second_player_gets_snapshot_and_movement_is_relayed() {
    let addr = spawn_server(options(Duration::from_millis(50))).await;

    let (mut a, a_id) = connect(&addr).await;
    let snapshot = recv_json(&mut a).await;
    assert_eq!(snapshot, json!({"type": "worldSnapshot", "data": {}}));

    let (mut b, b_id) = connect(&addr).await;
    assert_ne!(a_id, b_id);

    // B sees exactly A, not itself.
    let snapshot = recv_json(&mut b).await;
    assert_eq!(
        snapshot,
        json!({
            "type": "worldSnapshot",
            "data": {
                a_id.clone(): {"id": a_id, "x": 400.0, "y": 300.0, "animationTag": "down", "skin": "player"}
            }
        })
    );

    let joined = recv_json(&mut a).await;
    assert_eq!(
        joined,
        json!({
            "type": "playerJoined",
            "data": {"id": b_id, "x": 400.0, "y": 300.0, "animationTag": "down", "skin": "player"}
        })
    );

    send_json(
        &mut a,
        json!({
            "type": "movementUpdate",
            "data": {"x": 450, "y": 300, "animationTag": "right", "skin": "player"}
        }),
    )
    .await;

    let moved = recv_json(&mut b).await;
    assert_eq!(
        moved,
        json!({
            "type": "playerMoved",
            "data": {"id": a_id, "x": 450.0, "y": 300.0, "animationTag": "right", "skin": "player"}
        })
    );

    // Never echoed back to the sender.
    expect_silence(&mut a).await;
}

#[tokio::test]
async fn skin_changes_are_allow_listed() {
    let addr = spawn_server(options(NO_LIMIT)).await;
    let (mut a, a_id) = connect(&addr).await;
    recv_json(&mut a).await;
    let (mut b, _b_id) = connect(&addr).await;
    recv_json(&mut b).await;
    recv_json(&mut a).await;

    send_json(&mut a, json!({"type": "skinChangeRequest", "data": {"skin": "ninja"}})).await;
    expect_silence(&mut b).await;

    send_json(&mut a, json!({"type": "skinChangeRequest", "data": {"skin": "samurai"}})).await;
    let changed = recv_json(&mut b).await;
    assert_eq!(
        changed,
        json!({"type": "skinChanged", "data": {"id": a_id, "skin": "samurai"}})
    );
    expect_silence(&mut a).await;
}

#[tokio::test]
async fn updates_inside_the_interval_are_dropped() {
    let addr = spawn_server(options(Duration::from_secs(5))).await;
    let (mut a, a_id) = connect(&addr).await;
    recv_json(&mut a).await;
    let (mut b, _b_id) = connect(&addr).await;
    recv_json(&mut b).await;

    send_json(&mut a, json!({"type": "movementUpdate", "data": {"x": 10, "y": 20}})).await;
    send_json(&mut a, json!({"type": "movementUpdate", "data": {"x": 99, "y": 99}})).await;

    let moved = recv_json(&mut b).await;
    assert_eq!(moved["type"], "playerMoved");
    assert_eq!(moved["data"]["x"], 10.0);
    expect_silence(&mut b).await;

    let players: serde_json::Value = reqwest::get(format!("http://{addr}/players"))
        .await
        .expect("players request")
        .json()
        .await
        .expect("players json");
    assert_eq!(players[&a_id]["x"], 10.0);
    assert_eq!(players[&a_id]["y"], 20.0);
}

#[tokio::test]
async fn malformed_messages_are_ignored_without_disconnecting() {
    let addr = spawn_server(options(NO_LIMIT)).await;
    let (mut a, a_id) = connect(&addr).await;
    recv_json(&mut a).await;
    let (mut b, _b_id) = connect(&addr).await;
    recv_json(&mut b).await;

    send_text(&mut a, "not json at all").await;
    send_json(&mut a, json!({"type": "movementUpdate", "data": {"x": 1, "y": "north"}})).await;
    send_json(&mut a, json!({"type": "teleport", "data": {"x": 1, "y": 2}})).await;
    a.send(Message::Binary(vec![1u8, 2, 3].into()))
        .await
        .expect("send binary");
    expect_silence(&mut b).await;

    // Bare legacy movement object still works on the same connection.
    send_json(&mut a, json!({"x": 5, "y": 6, "anim": "up"})).await;
    let moved = recv_json(&mut b).await;
    assert_eq!(
        moved,
        json!({
            "type": "playerMoved",
            "data": {"id": a_id, "x": 5.0, "y": 6.0, "animationTag": "up", "skin": "player"}
        })
    );
}

#[tokio::test]
async fn disconnect_broadcasts_player_left_and_clears_registry() {
    let addr = spawn_server(options(NO_LIMIT)).await;
    let (mut a, a_id) = connect(&addr).await;
    recv_json(&mut a).await;
    let (mut b, b_id) = connect(&addr).await;
    recv_json(&mut b).await;
    let (mut c, _c_id) = connect(&addr).await;
    recv_json(&mut c).await;
    recv_json(&mut b).await;

    a.close(None).await.expect("close a");

    let left = json!({"type": "playerLeft", "data": {"id": a_id}});
    assert_eq!(recv_json(&mut b).await, left);
    assert_eq!(recv_json(&mut c).await, left);

    let players: serde_json::Value = reqwest::get(format!("http://{addr}/players"))
        .await
        .expect("players request")
        .json()
        .await
        .expect("players json");
    let ids: Vec<&String> = players.as_object().expect("map").keys().collect();
    assert_eq!(ids.len(), 2);
    assert!(players.get(&a_id).is_none());
    assert!(players.get(&b_id).is_some());
}

#[tokio::test]
async fn dropped_socket_without_close_frame_still_leaves() {
    let addr = spawn_server(options(NO_LIMIT)).await;
    let (mut a, a_id) = connect(&addr).await;
    recv_json(&mut a).await;
    let (mut b, b_id) = connect(&addr).await;
    recv_json(&mut b).await;
    recv_json(&mut a).await;

    // Tear down the TCP stream without a closing handshake.
    drop(a);

    let left = recv_json(&mut b).await;
    assert_eq!(left, json!({"type": "playerLeft", "data": {"id": a_id}}));

    let players: serde_json::Value = reqwest::get(format!("http://{addr}/players"))
        .await
        .expect("players request")
        .json()
        .await
        .expect("players json");
    let ids: Vec<&String> = players.as_object().expect("map").keys().collect();
    assert_eq!(ids, vec![&b_id]);
}

#[tokio::test]
async fn repeated_invalid_messages_close_connection_when_configured() {
    let mut opts = options(NO_LIMIT);
    opts.max_invalid_messages = 2;
    let addr = spawn_server(opts).await;
    let (mut a, _a_id) = connect(&addr).await;
    recv_json(&mut a).await;

    for _ in 0..3 {
        send_text(&mut a, "{").await;
    }

    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match a.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return true,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("connection should be closed");
    assert!(closed);
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let addr = spawn_server(options(NO_LIMIT)).await;

    let res = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("health request");

    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = res.json().await.expect("health json");
    assert_eq!(body, json!({"status": "ok"}));
}
