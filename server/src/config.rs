// Configuration for the relay server, read from the environment

use std::{str::FromStr, time::Duration};

use llm_core::LlmConfig;
use tts_core::SpeechConfig;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub llm: LlmConfig,
    pub speech: SpeechConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            request_timeout_secs: 60,
            cors_allowed_origins: None,
            llm: LlmConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        let llm = LlmConfig {
            api_key: api_key.clone(),
            endpoint: env_string("OPENAI_CHAT_ENDPOINT", defaults.llm.endpoint),
            model: env_string("LLM_MODEL", defaults.llm.model),
            max_tokens: env_or("LLM_MAX_TOKENS", defaults.llm.max_tokens),
            temperature: env_or("LLM_TEMPERATURE", defaults.llm.temperature),
            timeout_secs: env_or("LLM_TIMEOUT_SECS", defaults.llm.timeout_secs),
            system_prompt: std::env::var("SYSTEM_PROMPT").ok().filter(|p| !p.trim().is_empty()),
        };

        let speech = SpeechConfig {
            api_key,
            endpoint: env_string("OPENAI_TTS_ENDPOINT", defaults.speech.endpoint),
            model: env_string("OPENAI_TTS_MODEL", defaults.speech.model),
            voice: env_string("TTS_VOICE", defaults.speech.voice),
            timeout_secs: env_or("TTS_TIMEOUT_SECS", defaults.speech.timeout_secs),
        };

        Self {
            port: env_or("PORT", defaults.port),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            cors_allowed_origins,
            llm,
            speech,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
