//! WebSocket relay: one conversation channel per connection.
//!
//! Each `ask` runs as its own task that streams the upstream completion and
//! pushes events into a channel. The connection loop forwards those events
//! to the socket while still reading frames, so it notices a close (and
//! aborts the turn) or a second `ask` (and rejects it) mid-stream.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use llm_core::{ClientMessage, ConversationTurn, LlmClient, LlmError, ServerMessage};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::metrics::{AppMetrics, RelayMetrics};
use crate::validation::validate_ask;
use crate::AppState;

/// Events buffered between a turn task and the socket writer.
const OUTBOUND_BUFFER: usize = 64;

pub const TURN_IN_FLIGHT: &str = "a response is already streaming on this connection";
pub const INVALID_MESSAGE: &str = "Invalid message format";

#[derive(Debug, Error)]
enum TurnError {
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("client went away")]
    Disconnected,
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4();
    let metrics = state.metrics.clone();
    metrics.relay.connection_opened();
    connection_loop(socket, state)
        .instrument(info_span!("ws", conn = %conn_id))
        .await;
    metrics.relay.connection_closed();
}

async fn connection_loop(socket: WebSocket, state: AppState) {
    info!("ws connected");
    let (mut sink, mut frames) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);
    let mut turn: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            frame = frames.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(error = %e, "ws read failed");
                        break;
                    }
                };

                let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(ClientMessage::Ask { messages }) if turn.is_none() => {
                        debug!(turns = messages.len(), "ask received");
                        let task = run_turn(state.llm.clone(), state.metrics.clone(), messages, tx.clone());
                        turn = Some(tokio::spawn(task.in_current_span()));
                        continue;
                    }
                    Ok(ClientMessage::Ask { .. }) => {
                        warn!("ask received while a turn is streaming, rejecting");
                        state.metrics.relay.turn_rejected();
                        ServerMessage::error(TURN_IN_FLIGHT)
                    }
                    Err(e) => {
                        warn!(error = %e, "unparseable client frame");
                        ServerMessage::error(INVALID_MESSAGE)
                    }
                };
                if send(&mut sink, &reply).await.is_err() {
                    break;
                }
            }
            Some(event) = rx.recv() => {
                let terminal = event.is_terminal();
                if send(&mut sink, &event).await.is_err() {
                    break;
                }
                if terminal {
                    turn = None;
                }
            }
        }
    }

    if let Some(task) = turn.take() {
        task.abort();
        state.metrics.relay.turn_aborted();
        info!("connection closed mid-turn, upstream request aborted");
    }
    info!("ws disconnected");
}

async fn send(sink: &mut SplitSink<WebSocket, Message>, event: &ServerMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(axum::Error::new)?;
    sink.send(Message::Text(json.into())).await
}

/// Drive one turn: `Ack`, one `Chunk` per upstream delta, then exactly one
/// of `Done` or `Error`.
///
/// Returns early without a terminal event only if the receiver is gone.
pub async fn run_turn(
    llm: Arc<LlmClient>,
    metrics: Arc<AppMetrics>,
    messages: Vec<ConversationTurn>,
    tx: mpsc::Sender<ServerMessage>,
) {
    let metrics = &metrics.relay;
    metrics.turn_started();
    if tx.send(ServerMessage::Ack).await.is_err() {
        return;
    }

    let terminal = match relay_deltas(&llm, metrics, &messages, &tx).await {
        Ok(chunks) => {
            info!(chunks, "turn complete");
            metrics.turn_completed();
            ServerMessage::Done
        }
        Err(TurnError::Disconnected) => return,
        Err(TurnError::Llm(e)) => {
            warn!(error = %e, "turn failed");
            metrics.turn_failed();
            ServerMessage::error(e.client_message())
        }
        Err(e) => {
            warn!(error = %e, "turn rejected");
            metrics.turn_failed();
            ServerMessage::error(e.to_string())
        }
    };
    let _ = tx.send(terminal).await;
}

async fn relay_deltas(
    llm: &LlmClient,
    metrics: &RelayMetrics,
    messages: &[ConversationTurn],
    tx: &mpsc::Sender<ServerMessage>,
) -> Result<usize, TurnError> {
    validate_ask(messages).map_err(|e| TurnError::Invalid(e.to_string()))?;

    let mut deltas = llm.stream_chat(messages).await?;
    let mut chunks = 0;
    while let Some(delta) = deltas.next().await {
        let delta = delta?;
        tx.send(ServerMessage::chunk(delta))
            .await
            .map_err(|_| TurnError::Disconnected)?;
        metrics.chunk_relayed();
        chunks += 1;
    }
    Ok(chunks)
}
