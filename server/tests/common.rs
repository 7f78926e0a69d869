//! Common utilities for integration tests

#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use httpmock::MockServer;
use llm_core::{ClientMessage, ConversationTurn, LlmConfig, ServerMessage};
use server::{build_router, config::ServerConfig, AppState};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tts_core::SpeechConfig;

pub const CHAT_PATH: &str = "/v1/chat/completions";
pub const SPEECH_PATH: &str = "/v1/audio/speech";

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Server configuration pointed at a mock provider
pub fn test_config(upstream: &MockServer) -> ServerConfig {
    ServerConfig {
        llm: LlmConfig {
            api_key: "test-key".to_string(),
            endpoint: upstream.url(CHAT_PATH),
            timeout_secs: 5,
            ..LlmConfig::default()
        },
        speech: SpeechConfig {
            api_key: "test-key".to_string(),
            endpoint: upstream.url(SPEECH_PATH),
            ..SpeechConfig::default()
        },
        ..ServerConfig::default()
    }
}

pub fn test_state(upstream: &MockServer) -> AppState {
    AppState::new(test_config(upstream)).expect("Failed to create app state for tests")
}

pub fn test_app(upstream: &MockServer) -> Router {
    build_router(test_state(upstream))
}

/// Serve the app on an ephemeral port
pub async fn spawn_app(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

pub async fn send_ask(ws: &mut WsClient, messages: Vec<ConversationTurn>) {
    let ask = serde_json::to_string(&ClientMessage::Ask { messages }).unwrap();
    ws.send(Message::Text(ask.into())).await.unwrap();
}

/// Next relay event, or `None` if nothing arrives within `wait`
pub async fn next_event_within(ws: &mut WsClient, wait: Duration) -> Option<ServerMessage> {
    loop {
        let frame = tokio::time::timeout(wait, ws.next()).await.ok()??.ok()?;
        match frame {
            Message::Text(text) => return Some(serde_json::from_str(text.as_str()).unwrap()),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

pub async fn next_event(ws: &mut WsClient) -> ServerMessage {
    next_event_within(ws, Duration::from_secs(5))
        .await
        .expect("expected a relay event")
}

/// Collect events up to and including the terminal one
pub async fn collect_turn(ws: &mut WsClient) -> Vec<ServerMessage> {
    let mut events = Vec::new();
    loop {
        let event = next_event(ws).await;
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            return events;
        }
    }
}

/// Chat-completion event stream carrying `deltas`
pub fn event_stream(deltas: &[&str]) -> String {
    let mut body = String::from("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for delta in deltas {
        let record = serde_json::json!({ "choices": [{ "delta": { "content": delta } }] });
        body.push_str(&format!("data: {record}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}
