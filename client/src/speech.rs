use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use tts_core::{AudioOutput, FileOutput, HttpSynthesizer, PlaybackController, SpeechDiagnostic, SpeechQueue};

use crate::config::{ClientConfig, OutputKind};
use crate::error::ClientError;

/// Speech pipeline for one session: synthesis through the relay server's
/// `/api/tts`, playback on the configured output.
pub fn build_speech_queue(config: &ClientConfig) -> anyhow::Result<SpeechQueue> {
    let synthesizer = Arc::new(HttpSynthesizer::new(config.tts_url.clone(), config.tts_timeout())?);
    let output: Arc<dyn AudioOutput> = match config.output {
        OutputKind::File => Arc::new(FileOutput::new(config.audio_dir.clone())),
        OutputKind::Device => device_output()?,
    };

    let queue = SpeechQueue::new(synthesizer, PlaybackController::new(output), config.format);
    queue.set_enabled(config.voice_enabled);
    Ok(queue)
}

#[cfg(feature = "rodio")]
fn device_output() -> Result<Arc<dyn AudioOutput>, ClientError> {
    Ok(Arc::new(tts_core::RodioOutput))
}

#[cfg(not(feature = "rodio"))]
fn device_output() -> Result<Arc<dyn AudioOutput>, ClientError> {
    Err(ClientError::Config(
        "AUDIO_OUTPUT=device needs the client built with the `rodio` feature".to_string(),
    ))
}

/// Log speech diagnostics until the queue goes away.
pub async fn log_diagnostics(mut diagnostics: broadcast::Receiver<SpeechDiagnostic>) {
    loop {
        match diagnostics.recv().await {
            Ok(SpeechDiagnostic::SynthesisFailed { text, reason }) => {
                warn!(%reason, chars = text.len(), "sentence skipped, synthesis failed")
            }
            Ok(SpeechDiagnostic::StartRejected { reason }) => warn!(%reason, "playback refused, retrying muted"),
            Ok(SpeechDiagnostic::PlaybackFailed { reason }) => warn!(%reason, "playback failed"),
            Ok(SpeechDiagnostic::Stopped) => debug!("playback stopped"),
            Ok(SpeechDiagnostic::Played { text }) => debug!(chars = text.len(), "sentence played"),
            Err(RecvError::Lagged(n)) => debug!(missed = n, "diagnostics lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
