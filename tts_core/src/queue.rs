//! Ordered text-to-speech playback.
//!
//! Sentences are queued as they complete and spoken one at a time by a
//! single drain worker: synthesize the head entry, play it to completion,
//! then move on. A failing entry is skipped, never retried.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::diagnostics::{self, DiagnosticSender, SpeechDiagnostic};
use crate::format::AudioFormat;
use crate::playback::{AudioClip, PlaybackController};
use crate::synth::{SynthesisError, Synthesizer};

#[derive(Default)]
struct QueueState {
    pending: VecDeque<String>,
    draining: bool,
}

struct Inner {
    state: Mutex<QueueState>,
    enabled: AtomicBool,
    /// Bumped by every `stop`; a sentence synthesized across a bump is dropped.
    generation: AtomicU64,
    synthesizer: Arc<dyn Synthesizer>,
    player: PlaybackController,
    format: AudioFormat,
    idle: watch::Sender<bool>,
    diagnostics: DiagnosticSender,
}

/// FIFO of sentences awaiting speech. One per client session; clones share
/// the same queue.
#[derive(Clone)]
pub struct SpeechQueue {
    inner: Arc<Inner>,
}

impl SpeechQueue {
    pub fn new(synthesizer: Arc<dyn Synthesizer>, player: PlaybackController, format: AudioFormat) -> Self {
        let diagnostics = player.diagnostics();
        let (idle, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                enabled: AtomicBool::new(true),
                generation: AtomicU64::new(0),
                synthesizer,
                player,
                format,
                idle,
                diagnostics,
            }),
        }
    }

    /// Queue `text` for speech and make sure a drain worker is running.
    ///
    /// No-op when voice output is disabled or `text` is blank. Must be called
    /// from within a tokio runtime.
    pub fn enqueue(&self, text: &str) {
        let text = text.trim();
        if !self.is_enabled() || text.is_empty() {
            return;
        }
        self.inner.lock().pending.push_back(text.to_string());
        self.drain();
    }

    /// Start the drain worker unless one is already active or nothing is queued.
    pub fn drain(&self) {
        {
            let mut state = self.inner.lock();
            if state.draining || state.pending.is_empty() {
                return;
            }
            state.draining = true;
            self.inner.idle.send_replace(false);
        }
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run().await });
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Relaxed);
        info!(enabled, "voice output toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    /// Drop every pending entry and silence the current one, whether it is
    /// still being synthesized or already playing.
    pub fn stop(&self) {
        let dropped = {
            let mut state = self.inner.lock();
            let n = state.pending.len();
            state.pending.clear();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            n
        };
        debug!(dropped, "speech queue stopped");
        self.inner.player.stop();
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.lock().draining
    }

    /// Resolves once no drain worker is active.
    pub async fn wait_idle(&self) {
        let mut idle = self.inner.idle.subscribe();
        // the sender lives in `inner`, so this only ends when idle
        let _ = idle.wait_for(|idle| *idle).await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpeechDiagnostic> {
        self.inner.diagnostics.subscribe()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // a panic while holding the lock leaves the queue itself consistent
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run(self: Arc<Self>) {
        loop {
            let next = {
                let mut state = self.lock();
                match state.pending.pop_front() {
                    Some(text) => text,
                    None => {
                        state.draining = false;
                        self.idle.send_replace(true);
                        break;
                    }
                }
            };
            self.speak(next).await;
        }
    }

    async fn speak(&self, text: String) {
        if !self.enabled.load(Ordering::Relaxed) {
            debug!("voice disabled, skipping queued sentence");
            return;
        }
        let generation = self.generation.load(Ordering::SeqCst);

        let audio = match self.synthesizer.synthesize(&text, self.format).await {
            Ok(audio) if audio.is_empty() => Err(SynthesisError::Empty),
            other => other,
        };
        let audio = match audio {
            Ok(audio) => audio,
            Err(e) => {
                warn!(error = %e, chars = text.len(), "skipping sentence that failed to synthesize");
                diagnostics::publish(
                    &self.diagnostics,
                    SpeechDiagnostic::SynthesisFailed { text, reason: e.to_string() },
                );
                return;
            }
        };

        if !self.enabled.load(Ordering::Relaxed) || self.generation.load(Ordering::SeqCst) != generation {
            debug!(chars = text.len(), "stopped during synthesis, dropping sentence");
            return;
        }

        let clip = AudioClip::new(audio, self.format.mime_type());
        if self.player.play(clip).await {
            diagnostics::publish(&self.diagnostics, SpeechDiagnostic::Played { text });
        }
    }
}
