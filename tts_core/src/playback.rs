//! Playback of one synthesized clip at a time.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, Notify};
use tracing::{debug, warn};

use crate::diagnostics::{self, DiagnosticSender, SpeechDiagnostic};
use crate::format::AudioFormat;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio device error: {0}")]
    Device(String),

    #[error("could not decode audio: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The environment refused to start playback (e.g. an autoplay policy).
    #[error("playback rejected: {0}")]
    Rejected(String),
}

/// Encoded audio plus its mime type. Lives only for one `play` call.
#[derive(Debug, Clone)]
pub struct AudioClip {
    bytes: Vec<u8>,
    mime_type: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self { bytes, mime_type: mime_type.into() }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

/// A sink able to start playing a clip.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Start playing `clip`. Returns once playback has begun.
    async fn start(&self, clip: &AudioClip, muted: bool) -> Result<Box<dyn ActivePlayback>, PlaybackError>;
}

/// A playback in progress. Dropping it releases the underlying resource.
#[async_trait]
pub trait ActivePlayback: Send {
    /// Resolves when playback ends, naturally or with an error.
    async fn finished(&mut self) -> Result<(), PlaybackError>;

    fn stop(&mut self);
}

/// Owns the single live playback.
///
/// `play` never fails: start rejection is retried once muted, and any other
/// failure is logged and published as a [`SpeechDiagnostic`].
pub struct PlaybackController {
    output: Arc<dyn AudioOutput>,
    slot: Mutex<()>,
    stop: Notify,
    diagnostics: DiagnosticSender,
}

impl PlaybackController {
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            slot: Mutex::new(()),
            stop: Notify::new(),
            diagnostics: diagnostics::channel(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpeechDiagnostic> {
        self.diagnostics.subscribe()
    }

    pub(crate) fn diagnostics(&self) -> DiagnosticSender {
        self.diagnostics.clone()
    }

    /// Play `clip` to completion. Returns `true` when it played without error.
    pub async fn play(&self, clip: AudioClip) -> bool {
        let _slot = self.slot.lock().await;
        // registered before start so a stop issued while starting is not lost
        let stopped = self.stop.notified();
        tokio::pin!(stopped);
        stopped.as_mut().enable();

        let mut playback = match self.output.start(&clip, false).await {
            Ok(playback) => playback,
            Err(e) => {
                warn!(error = %e, "audio start failed, retrying muted");
                diagnostics::publish(
                    &self.diagnostics,
                    SpeechDiagnostic::StartRejected { reason: e.to_string() },
                );
                match self.output.start(&clip, true).await {
                    Ok(playback) => playback,
                    Err(e) => {
                        warn!(error = %e, "muted audio start failed");
                        diagnostics::publish(
                            &self.diagnostics,
                            SpeechDiagnostic::PlaybackFailed { reason: e.to_string() },
                        );
                        return false;
                    }
                }
            }
        };

        debug!(bytes = clip.bytes().len(), mime = clip.mime_type(), "playback started");

        tokio::select! {
            biased;
            _ = &mut stopped => {
                playback.stop();
                diagnostics::publish(&self.diagnostics, SpeechDiagnostic::Stopped);
                false
            }
            result = playback.finished() => match result {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "audio playback error");
                    diagnostics::publish(
                        &self.diagnostics,
                        SpeechDiagnostic::PlaybackFailed { reason: e.to_string() },
                    );
                    false
                }
            },
        }
    }

    /// Stop the current playback, if any.
    pub fn stop(&self) {
        self.stop.notify_waiters();
    }
}

/// Writes every clip to `dir` as a numbered file and completes at once.
pub struct FileOutput {
    dir: PathBuf,
    counter: AtomicUsize,
}

impl FileOutput {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), counter: AtomicUsize::new(0) }
    }
}

struct Finished;

#[async_trait]
impl ActivePlayback for Finished {
    async fn finished(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn stop(&mut self) {}
}

#[async_trait]
impl AudioOutput for FileOutput {
    async fn start(&self, clip: &AudioClip, _muted: bool) -> Result<Box<dyn ActivePlayback>, PlaybackError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let ext = AudioFormat::extension_for_mime(clip.mime_type());
        let path = self.dir.join(format!("clip-{n:04}.{ext}"));
        tokio::fs::write(&path, clip.bytes()).await?;
        debug!(path = %path.display(), "wrote audio clip");
        Ok(Box::new(Finished))
    }
}

#[cfg(feature = "rodio")]
pub use device::RodioOutput;

#[cfg(feature = "rodio")]
mod device {
    use std::{
        io::Cursor,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use super::{ActivePlayback, AudioClip, AudioOutput, PlaybackError};

    const POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Plays clips on the default output device. Each clip gets its own
    /// audio thread, which owns the output stream for the clip's lifetime.
    #[derive(Default)]
    pub struct RodioOutput;

    struct DevicePlayback {
        done: oneshot::Receiver<Result<(), PlaybackError>>,
        stop: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ActivePlayback for DevicePlayback {
        async fn finished(&mut self) -> Result<(), PlaybackError> {
            (&mut self.done)
                .await
                .map_err(|_| PlaybackError::Device("audio thread exited".to_string()))?
        }

        fn stop(&mut self) {
            self.stop.store(true, Ordering::Relaxed);
        }
    }

    impl Drop for DevicePlayback {
        fn drop(&mut self) {
            self.stop.store(true, Ordering::Relaxed);
        }
    }

    #[async_trait]
    impl AudioOutput for RodioOutput {
        async fn start(&self, clip: &AudioClip, muted: bool) -> Result<Box<dyn ActivePlayback>, PlaybackError> {
            let bytes = clip.bytes().to_vec();
            let (started_tx, started_rx) = oneshot::channel::<Result<(), PlaybackError>>();
            let (done_tx, done_rx) = oneshot::channel();
            let stop = Arc::new(AtomicBool::new(false));
            let stop_flag = stop.clone();

            std::thread::spawn(move || {
                let stream = match rodio::OutputStreamBuilder::open_default_stream() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = started_tx.send(Err(PlaybackError::Device(e.to_string())));
                        return;
                    }
                };
                let source = match rodio::Decoder::new(Cursor::new(bytes)) {
                    Ok(source) => source,
                    Err(e) => {
                        let _ = started_tx.send(Err(PlaybackError::Decode(e.to_string())));
                        return;
                    }
                };
                let sink = rodio::Sink::connect_new(stream.mixer());
                sink.set_volume(if muted { 0.0 } else { 1.0 });
                sink.append(source);
                let _ = started_tx.send(Ok(()));

                while !sink.empty() {
                    if stop_flag.load(Ordering::Relaxed) {
                        sink.stop();
                        break;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                let _ = done_tx.send(Ok(()));
            });

            started_rx
                .await
                .map_err(|_| PlaybackError::Device("audio thread exited".to_string()))??;
            Ok(Box::new(DevicePlayback { done: done_rx, stop }))
        }
    }
}
