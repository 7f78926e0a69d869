pub mod error;
pub mod protocol;
pub mod sse;

use std::{pin::Pin, time::Duration};

use anyhow::Result;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use error::LlmError;
pub use protocol::{ClientMessage, ConversationTurn, Role, ServerMessage};

/// Non-empty content deltas of one streamed completion, in arrival order.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Settings for the upstream chat-completion provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u16,
    pub temperature: f32,
    /// Bound on waiting for response headers, and on the gap between two reads.
    pub timeout_secs: u64,
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 30,
            system_prompt: None,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Request body of a streamed chat completion.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<&'a ConversationTurn>,
    max_tokens: u16,
    temperature: f32,
    stream: bool,
}

/// One record of the completion event stream.
#[derive(Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

impl CompletionChunk {
    fn into_delta(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty())
    }
}

pub struct LlmClient {
    client: Client,
    config: LlmConfig,
    system_turn: Option<ConversationTurn>,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.timeout())
            .build()?;
        let system_turn = config
            .system_prompt
            .as_ref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| ConversationTurn::system(p.clone()));
        Ok(Self { client, config, system_turn })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Start a streamed completion over the full turn history.
    ///
    /// Resolves once the provider answered with a success status; the
    /// returned stream then yields each non-empty delta and ends at the
    /// sentinel.
    pub async fn stream_chat(&self, turns: &[ConversationTurn]) -> Result<DeltaStream, LlmError> {
        let messages: Vec<&ConversationTurn> = self.system_turn.iter().chain(turns.iter()).collect();
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: true,
        };

        info!(turns = turns.len(), model = %self.config.model, "requesting streamed completion");

        let timeout = self.config.timeout();
        let request = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send();
        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| LlmError::Timeout(timeout))??;

        let status = response.status();
        debug!(status = status.as_u16(), "upstream responded");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Upstream { status: status.as_u16(), body });
        }

        let body = idle_timeout(response.bytes_stream(), timeout);
        let deltas = sse::reframe::<CompletionChunk, _, _, _>(body).filter_map(|record| async move {
            match record {
                Ok(chunk) => chunk.into_delta().map(Ok),
                Err(e) => Some(Err(e)),
            }
        });
        Ok(Box::pin(deltas))
    }
}

/// Fail a byte stream with [`LlmError::Timeout`] when no read completes within `limit`.
fn idle_timeout<S, B>(body: S, limit: Duration) -> impl Stream<Item = Result<B, LlmError>>
where
    S: Stream<Item = Result<B, reqwest::Error>>,
{
    async_stream::stream! {
        futures::pin_mut!(body);
        loop {
            match tokio::time::timeout(limit, body.next()).await {
                Ok(Some(item)) => yield item.map_err(LlmError::from),
                Ok(None) => break,
                Err(_) => {
                    yield Err(LlmError::Timeout(limit));
                    break;
                }
            }
        }
    }
}
