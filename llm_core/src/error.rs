use std::time::Duration;

use thiserror::Error;

/// Failures of an upstream chat completion.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection or read failure talking to the provider.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status. `body` is kept verbatim.
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("upstream timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl LlmError {
    /// Text relayed to the client in an `error` event.
    pub fn client_message(&self) -> String {
        match self {
            LlmError::Upstream { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Transport(e.to_string())
    }
}
