//! Client session against an in-process relay server backed by a mock provider.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use client::{ClientError, Session, TurnOutcome};
use httpmock::prelude::*;
use llm_core::{LlmConfig, Role, ServerMessage};
use serde_json::json;
use server::{build_router, config::ServerConfig, AppState};
use tokio::net::TcpListener;
use tts_core::{
    ActivePlayback, AudioClip, AudioFormat, AudioOutput, HttpSynthesizer, PlaybackController, PlaybackError,
    SpeechConfig, SpeechQueue,
};

const CHAT_PATH: &str = "/v1/chat/completions";
const SPEECH_PATH: &str = "/v1/audio/speech";

async fn spawn_relay(upstream: &MockServer) -> SocketAddr {
    let config = ServerConfig {
        llm: LlmConfig {
            api_key: "test-key".to_string(),
            endpoint: upstream.url(CHAT_PATH),
            timeout_secs: 5,
            ..LlmConfig::default()
        },
        speech: SpeechConfig {
            api_key: "test-key".to_string(),
            endpoint: upstream.url(SPEECH_PATH),
            ..SpeechConfig::default()
        },
        ..ServerConfig::default()
    };
    let app = build_router(AppState::new(config).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn event_stream(deltas: &[&str]) -> String {
    let mut body = String::new();
    for delta in deltas {
        let record = json!({ "choices": [{ "delta": { "content": delta } }] });
        body.push_str(&format!("data: {record}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// Records every clip and finishes playback at once.
#[derive(Default)]
struct RecordingOutput {
    clips: Mutex<Vec<AudioClip>>,
}

impl RecordingOutput {
    fn clips(&self) -> Vec<AudioClip> {
        self.clips.lock().unwrap().clone()
    }
}

struct Instant;

#[async_trait]
impl ActivePlayback for Instant {
    async fn finished(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn stop(&mut self) {}
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    async fn start(&self, clip: &AudioClip, _muted: bool) -> Result<Box<dyn ActivePlayback>, PlaybackError> {
        self.clips.lock().unwrap().push(clip.clone());
        Ok(Box::new(Instant))
    }
}

async fn connect(addr: SocketAddr) -> (Session, Arc<RecordingOutput>) {
    let output = Arc::new(RecordingOutput::default());
    let synthesizer = Arc::new(HttpSynthesizer::new(format!("http://{addr}/api/tts"), Duration::from_secs(5)).unwrap());
    let speech = SpeechQueue::new(synthesizer, PlaybackController::new(output.clone()), AudioFormat::Mp3);
    let session = Session::connect(&format!("ws://{addr}/ws"), speech).await.unwrap();
    (session, output)
}

fn speech_request(text: &str) -> serde_json::Value {
    json!({ "model": "tts-1", "input": text, "voice": "nova", "response_format": "mp3" })
}

#[tokio::test]
async fn test_reply_is_streamed_and_spoken_once() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(POST).path(CHAT_PATH);
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(event_stream(&["Hello", " there", "!"]));
        })
        .await;
    let speech = upstream
        .mock_async(|when, then| {
            when.method(POST).path(SPEECH_PATH).json_body(speech_request("Hello there!"));
            then.status(200).header("content-type", "audio/mpeg").body(vec![1u8, 2, 3]);
        })
        .await;
    let addr = spawn_relay(&upstream).await;
    let (mut session, output) = connect(addr).await;

    let mut seen = Vec::new();
    let state = session.ask("Hi", |event| seen.push(event.clone())).await.unwrap();

    assert_eq!(seen.first(), Some(&ServerMessage::Ack));
    assert_eq!(seen.last(), Some(&ServerMessage::Done));
    assert!(state.acked);
    assert_eq!(state.content, "Hello there!");
    assert_eq!(state.outcome, TurnOutcome::Done);

    tokio::time::timeout(Duration::from_secs(5), session.speech().wait_idle())
        .await
        .expect("speech queue did not go idle");
    speech.assert_hits_async(1).await;
    let clips = output.clips();
    assert_eq!(clips.len(), 1);
    assert_eq!(clips[0].bytes(), &[1, 2, 3]);
    assert_eq!(clips[0].mime_type(), "audio/mpeg");

    let turns = session.conversation().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[1].content, "Hello there!");
}

#[tokio::test]
async fn test_sentences_play_in_order() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(POST).path(CHAT_PATH);
            then.status(200)
                .body(event_stream(&["First one. Sec", "ond one", "! And a tail"]));
        })
        .await;
    for (text, byte) in [("First one.", 1u8), ("Second one!", 2), ("And a tail", 3)] {
        upstream
            .mock_async(|when, then| {
                when.method(POST).path(SPEECH_PATH).json_body(speech_request(text));
                then.status(200).body(vec![byte]);
            })
            .await;
    }
    let addr = spawn_relay(&upstream).await;
    let (mut session, output) = connect(addr).await;

    session.ask("Talk to me", |_| {}).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), session.speech().wait_idle())
        .await
        .unwrap();

    let order: Vec<u8> = output.clips().iter().map(|c| c.bytes()[0]).collect();
    assert_eq!(order, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_failed_turn_is_not_remembered() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(POST).path(CHAT_PATH);
            then.status(500).body("The server had an error while processing your request");
        })
        .await;
    let speech = upstream
        .mock_async(|when, then| {
            when.method(POST).path(SPEECH_PATH);
            then.status(200).body(vec![0u8]);
        })
        .await;
    let addr = spawn_relay(&upstream).await;
    let (mut session, output) = connect(addr).await;

    let state = session.ask("Hi", |_| {}).await.unwrap();

    assert_eq!(
        state.display_text(),
        "Error: The server had an error while processing your request"
    );
    assert!(session.conversation().is_empty());
    session.speech().wait_idle().await;
    speech.assert_hits_async(0).await;
    assert!(output.clips().is_empty());
}

#[tokio::test]
async fn test_voice_off_skips_synthesis() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(POST).path(CHAT_PATH);
            then.status(200).body(event_stream(&["Quiet please."]));
        })
        .await;
    let speech = upstream
        .mock_async(|when, then| {
            when.method(POST).path(SPEECH_PATH);
            then.status(200).body(vec![0u8]);
        })
        .await;
    let addr = spawn_relay(&upstream).await;
    let (mut session, output) = connect(addr).await;
    session.speech().set_enabled(false);

    let state = session.ask("Hi", |_| {}).await.unwrap();

    assert_eq!(state.content, "Quiet please.");
    session.speech().wait_idle().await;
    speech.assert_hits_async(0).await;
    assert!(output.clips().is_empty());
}

#[tokio::test]
async fn test_history_grows_across_turns() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(POST).path(CHAT_PATH);
            then.status(200).body(event_stream(&["Noted."]));
        })
        .await;
    let addr = spawn_relay(&upstream).await;
    let (mut session, _output) = connect(addr).await;
    session.speech().set_enabled(false);

    session.ask("My name is Sam", |_| {}).await.unwrap();
    session.ask("What is my name?", |_| {}).await.unwrap();

    let contents: Vec<&str> = session
        .conversation()
        .turns()
        .iter()
        .map(|t| t.content.as_str())
        .collect();
    assert_eq!(contents, vec!["My name is Sam", "Noted.", "What is my name?", "Noted."]);
}

#[tokio::test]
async fn test_connect_failure() {
    let output = Arc::new(RecordingOutput::default());
    let synthesizer = Arc::new(HttpSynthesizer::new("http://127.0.0.1:9/api/tts", Duration::from_secs(5)).unwrap());
    let speech = SpeechQueue::new(synthesizer, PlaybackController::new(output), AudioFormat::Mp3);

    let result = Session::connect("ws://127.0.0.1:9/ws", speech).await;
    assert!(matches!(result, Err(ClientError::Connect { .. })));
}
