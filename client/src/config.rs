use std::{env, path::PathBuf, str::FromStr, time::Duration};

use tts_core::AudioFormat;

use crate::error::ClientError;

/// Where synthesized speech ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Default audio device. Needs the `rodio` feature.
    Device,
    /// Numbered clip files under the audio directory.
    File,
}

impl Default for OutputKind {
    fn default() -> Self {
        if cfg!(feature = "rodio") {
            OutputKind::Device
        } else {
            OutputKind::File
        }
    }
}

impl FromStr for OutputKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "device" => Ok(OutputKind::Device),
            "file" => Ok(OutputKind::File),
            other => Err(ClientError::Config(format!(
                "AUDIO_OUTPUT must be 'device' or 'file', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub tts_url: String,
    /// Bound on one synthesis request, audio body included.
    pub tts_timeout_secs: u64,
    pub voice_enabled: bool,
    pub format: AudioFormat,
    pub output: OutputKind,
    pub audio_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:3000/ws".to_string(),
            tts_url: "http://localhost:3000/api/tts".to_string(),
            tts_timeout_secs: 30,
            voice_enabled: true,
            format: AudioFormat::default(),
            output: OutputKind::default(),
            audio_dir: PathBuf::from("./audio-out"),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ClientError> {
        let defaults = Self::default();

        let format = match env::var("TTS_FORMAT") {
            Ok(value) => value
                .parse()
                .map_err(|e| ClientError::Config(format!("TTS_FORMAT: {e}")))?,
            Err(_) => defaults.format,
        };
        let output = match env::var("AUDIO_OUTPUT") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.output,
        };
        let tts_timeout_secs = match env::var("TTS_TIMEOUT_SECS") {
            Ok(value) => value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ClientError::Config(format!("TTS_TIMEOUT_SECS: not a positive number: '{value}'")))?,
            Err(_) => defaults.tts_timeout_secs,
        };
        let voice_enabled = match env::var("VOICE_ENABLED") {
            Ok(value) => parse_flag(&value)
                .ok_or_else(|| ClientError::Config(format!("VOICE_ENABLED: not a boolean: '{value}'")))?,
            Err(_) => defaults.voice_enabled,
        };

        Ok(Self {
            server_url: env::var("SERVER_WS_URL").unwrap_or(defaults.server_url),
            tts_url: env::var("TTS_URL").unwrap_or(defaults.tts_url),
            tts_timeout_secs,
            voice_enabled,
            format,
            output,
            audio_dir: env::var("AUDIO_DIR").map(PathBuf::from).unwrap_or(defaults.audio_dir),
        })
    }
}

impl ClientConfig {
    pub fn tts_timeout(&self) -> Duration {
        Duration::from_secs(self.tts_timeout_secs)
    }
}

/// Accepts the usual spellings of on/off.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
