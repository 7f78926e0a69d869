//! Per-turn event log.
//!
//! Relay events for one `ask` are appended to a [`TurnLog`] and never
//! changed afterwards. What the turn looks like at any point is a fold of
//! the log through [`reduce`].

use llm_core::ServerMessage;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnOutcome {
    #[default]
    Streaming,
    Done,
    Failed(String),
}

/// Projection of a turn's events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TurnState {
    pub acked: bool,
    pub content: String,
    pub outcome: TurnOutcome,
}

impl TurnState {
    pub fn is_finished(&self) -> bool {
        self.outcome != TurnOutcome::Streaming
    }

    /// Text to show for the turn: the streamed content, or the error inline.
    pub fn display_text(&self) -> String {
        match &self.outcome {
            TurnOutcome::Failed(error) => format!("Error: {error}"),
            _ => self.content.clone(),
        }
    }
}

/// Apply one event to a turn state.
pub fn reduce(mut state: TurnState, event: &ServerMessage) -> TurnState {
    if state.is_finished() {
        return state;
    }
    match event {
        ServerMessage::Ack => state.acked = true,
        ServerMessage::Chunk { text } => state.content.push_str(text),
        ServerMessage::Done => state.outcome = TurnOutcome::Done,
        ServerMessage::Error { error } => state.outcome = TurnOutcome::Failed(error.clone()),
    }
    state
}

#[derive(Debug, Default)]
pub struct TurnLog {
    events: Vec<ServerMessage>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `event`. Returns `false`, leaving the log unchanged, once the
    /// turn has ended.
    pub fn push(&mut self, event: ServerMessage) -> bool {
        if self.is_finished() {
            warn!(?event, "event after end of turn, ignoring");
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn events(&self) -> &[ServerMessage] {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.events.last().is_some_and(ServerMessage::is_terminal)
    }

    pub fn state(&self) -> TurnState {
        self.events.iter().fold(TurnState::default(), reduce)
    }
}
