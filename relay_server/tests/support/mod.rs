// Shared helpers for driving a real relay server over TCP in integration tests.
#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use relay_server::ServerOptions;
use relay_server::use_cases::RelaySettings;
use serde_json::Value;
use std::{path::PathBuf, time::Duration};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Long enough for a loaded CI box, short enough to keep negative checks quick.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

pub fn options(min_update_interval: Duration) -> ServerOptions {
    ServerOptions {
        relay: RelaySettings {
            input_channel_capacity: 64,
            outbox_capacity: 64,
            min_update_interval,
        },
        static_dir: PathBuf::from("public"),
        max_invalid_messages: 0,
    }
}

// Start a dedicated server on an ephemeral port and return its `host:port`.
pub async fn spawn_server(options: ServerOptions) -> String {
    // Bind to an ephemeral port to avoid collisions with local services.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        relay_server::run_with_options(listener, options)
            .await
            .expect("server failed");
    });
    addr.to_string()
}

// Open a socket and consume the identity message, returning the assigned id.
pub async fn connect(addr: &str) -> (Client, String) {
    let (mut client, _response) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("websocket connect");
    let identity = recv_json(&mut client).await;
    assert_eq!(identity["type"], "identity");
    let id = identity["data"]["id"]
        .as_str()
        .expect("identity id is a string")
        .to_string();
    (client, id)
}

pub async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send message");
}

pub async fn send_text(client: &mut Client, text: &str) {
    client
        .send(Message::Text(text.to_string().into()))
        .await
        .expect("send message");
}

// Next JSON text frame, skipping control frames. Panics on timeout.
pub async fn recv_json(client: &mut Client) -> Value {
    tokio::time::timeout(RECV_TIMEOUT, next_json(client))
        .await
        .expect("timed out waiting for a message")
}

// Asserts nothing arrives for a short while.
pub async fn expect_silence(client: &mut Client) {
    if let Ok(value) = tokio::time::timeout(QUIET_PERIOD, next_json(client)).await {
        panic!("expected no message, got {value}");
    }
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = client
            .next()
            .await
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("server sends JSON");
        }
    }
}
