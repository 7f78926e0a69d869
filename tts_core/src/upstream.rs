//! Client for the provider's text-to-speech endpoint, used by the server's
//! `/api/tts` proxy.

use std::time::Duration;

use bytes::Bytes;
use futures::{stream::BoxStream, Stream, StreamExt};
use reqwest::{header, Client};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::format::AudioFormat;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech transport error: {0}")]
    Transport(String),

    #[error("speech provider returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("speech provider timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        SpeechError::Transport(e.to_string())
    }
}

pub type AudioByteStream = BoxStream<'static, Result<Bytes, SpeechError>>;

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub voice: String,
    /// Bound on waiting for response headers, and on the gap between two reads.
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://api.openai.com/v1/audio/speech".to_string(),
            model: "tts-1".to_string(),
            voice: "nova".to_string(),
            timeout_secs: 30,
        }
    }
}

impl SpeechConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: AudioFormat,
}

pub struct SpeechClient {
    client: Client,
    config: SpeechConfig,
}

impl SpeechClient {
    pub fn new(config: SpeechConfig) -> anyhow::Result<Self> {
        Ok(Self { client: Client::builder().build()?, config })
    }

    pub fn config(&self) -> &SpeechConfig {
        &self.config
    }

    /// Request speech for `text` and stream the audio bytes as they arrive.
    pub async fn speak(&self, text: &str, format: AudioFormat) -> Result<AudioByteStream, SpeechError> {
        info!(chars = text.len(), model = %self.config.model, %format, "requesting speech");

        let timeout = self.config.timeout();
        let request = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, format.mime_type())
            .json(&SpeechRequest {
                model: &self.config.model,
                input: text,
                voice: &self.config.voice,
                response_format: format,
            })
            .send();
        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| SpeechError::Timeout(timeout))??;

        let status = response.status();
        debug!(status = status.as_u16(), "speech provider responded");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Upstream { status: status.as_u16(), body });
        }

        Ok(idle_timeout(response.bytes_stream(), timeout).boxed())
    }
}

/// Fail the audio stream with [`SpeechError::Timeout`] when no read completes within `limit`.
fn idle_timeout<S>(body: S, limit: Duration) -> impl Stream<Item = Result<Bytes, SpeechError>>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    async_stream::stream! {
        futures::pin_mut!(body);
        loop {
            match tokio::time::timeout(limit, body.next()).await {
                Ok(Some(item)) => yield item.map_err(SpeechError::from),
                Ok(None) => break,
                Err(_) => {
                    warn!(limit_secs = limit.as_secs(), "speech provider stalled mid-body");
                    yield Err(SpeechError::Timeout(limit));
                    break;
                }
            }
        }
    }
}
