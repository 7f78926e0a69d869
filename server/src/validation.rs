use llm_core::ConversationTurn;
use tts_core::AudioFormat;

use crate::error::ApiError;

/// Maximum text length accepted by the speech provider
const MAX_TTS_TEXT_LENGTH: usize = 4096;
/// Maximum size of a single conversation turn
const MAX_TURN_LENGTH: usize = 32_000;
/// Maximum number of turns relayed upstream
const MAX_TURNS: usize = 200;

/// Validate a TTS request, returning the requested output format
pub fn validate_tts_request(text: Option<&str>, format: Option<&str>) -> Result<AudioFormat, ApiError> {
    let text = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Err(ApiError::InvalidInput("Missing text in request body".to_string())),
    };
    if text.chars().count() > MAX_TTS_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TTS_TEXT_LENGTH
        )));
    }

    match format {
        None => Ok(AudioFormat::default()),
        Some(f) => f.parse().map_err(|_| {
            ApiError::InvalidInput(format!(
                "Invalid format: {}. Expected one of mp3, opus, aac, flac, wav, pcm",
                f
            ))
        }),
    }
}

/// Validate the history carried by an `ask`
pub fn validate_ask(messages: &[ConversationTurn]) -> Result<(), ApiError> {
    if messages.is_empty() {
        return Err(ApiError::InvalidInput(
            "Conversation must contain at least one message".to_string(),
        ));
    }
    if messages.len() > MAX_TURNS {
        return Err(ApiError::InvalidInput(format!(
            "Conversation too long (max {} messages)",
            MAX_TURNS
        )));
    }
    if let Some(turn) = messages.iter().find(|t| t.content.len() > MAX_TURN_LENGTH) {
        return Err(ApiError::InvalidInput(format!(
            "Message too long ({} bytes, max {})",
            turn.content.len(),
            MAX_TURN_LENGTH
        )));
    }
    Ok(())
}
