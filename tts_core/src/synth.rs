//! Speech synthesis as seen from the client: text in, encoded audio out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::format::AudioFormat;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis request failed: {0}")]
    Request(String),

    #[error("synthesis returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("synthesis returned no audio")]
    Empty,
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        SynthesisError::Request(e.to_string())
    }
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Encoded audio for `text`. An empty payload is an error.
    async fn synthesize(&self, text: &str, format: AudioFormat) -> Result<Vec<u8>, SynthesisError>;
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    format: AudioFormat,
}

/// Calls the relay server's `POST /api/tts`.
pub struct HttpSynthesizer {
    client: Client,
    url: String,
}

impl HttpSynthesizer {
    /// `timeout` bounds the whole exchange, body included, so a stalled
    /// response fails the entry instead of holding up the queue.
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, format: AudioFormat) -> Result<Vec<u8>, SynthesisError> {
        let response = self
            .client
            .post(&self.url)
            .json(&TtsRequest { text, format })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Status { status: status.as_u16(), body });
        }

        let audio = response.bytes().await?;
        debug!(bytes = audio.len(), chars = text.len(), "received synthesized audio");
        if audio.is_empty() {
            return Err(SynthesisError::Empty);
        }
        Ok(audio.to_vec())
    }
}
