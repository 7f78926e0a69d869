//! Speech side of the voice chat: audio formats, the provider TTS client used
//! by the server, and the client pipeline turning streamed text into ordered
//! audio playback.

mod diagnostics;
pub mod format;
pub mod playback;
pub mod queue;
pub mod segmenter;
pub mod synth;
pub mod upstream;

pub use diagnostics::SpeechDiagnostic;
pub use format::AudioFormat;
pub use playback::{ActivePlayback, AudioClip, AudioOutput, FileOutput, PlaybackController, PlaybackError};
#[cfg(feature = "rodio")]
pub use playback::RodioOutput;
pub use queue::SpeechQueue;
pub use segmenter::SentenceSegmenter;
pub use synth::{HttpSynthesizer, SynthesisError, Synthesizer};
pub use upstream::{AudioByteStream, SpeechClient, SpeechConfig, SpeechError};
