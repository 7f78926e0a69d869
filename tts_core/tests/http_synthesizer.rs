//! `HttpSynthesizer` against a mock `/api/tts`.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use httpmock::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tts_core::{
    ActivePlayback, AudioClip, AudioFormat, AudioOutput, HttpSynthesizer, PlaybackController, PlaybackError,
    SpeechDiagnostic, SpeechQueue, SynthesisError, Synthesizer,
};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_synthesize_returns_audio_bytes() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/tts");
            then.status(200).header("content-type", "audio/mpeg").body(vec![9u8; 32]);
        })
        .await;

    let synth = HttpSynthesizer::new(server.url("/api/tts"), TIMEOUT).unwrap();
    let audio = synth.synthesize("Hello there!", AudioFormat::Mp3).await.unwrap();

    assert_eq!(audio.len(), 32);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_non_success_status_is_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/tts");
            then.status(502).body("provider down");
        })
        .await;

    let synth = HttpSynthesizer::new(server.url("/api/tts"), TIMEOUT).unwrap();
    match synth.synthesize("Hi.", AudioFormat::Mp3).await {
        Err(SynthesisError::Status { status, body }) => {
            assert_eq!(status, 502);
            assert_eq!(body, "provider down");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_payload_is_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/tts");
            then.status(200);
        })
        .await;

    let synth = HttpSynthesizer::new(server.url("/api/tts"), TIMEOUT).unwrap();
    let result = synth.synthesize("Hi.", AudioFormat::Mp3).await;
    assert!(matches!(result, Err(SynthesisError::Empty)));
}

/// Read one HTTP request, body included.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = socket.read(&mut buf).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&raw[..end]).to_ascii_lowercase();
        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if raw.len() >= end + 4 + length {
            break;
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

/// `/api/tts` that answers in full, except for text containing "Stalls.",
/// where it sends the headers and two of ten promised bytes, then goes quiet.
async fn stalling_tts() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                let head = "HTTP/1.1 200 OK\r\ncontent-type: audio/mpeg\r\ncontent-length: 10\r\nconnection: close\r\n\r\n";
                let _ = socket.write_all(head.as_bytes()).await;
                if request.contains("Stalls.") {
                    let _ = socket.write_all(&[1, 2]).await;
                    tokio::time::sleep(Duration::from_secs(60)).await;
                } else {
                    let _ = socket.write_all(&[7; 10]).await;
                }
            });
        }
    });
    format!("http://{addr}/api/tts")
}

#[derive(Default)]
struct RecordingOutput {
    clips: Mutex<Vec<Vec<u8>>>,
}

struct Done;

#[async_trait]
impl ActivePlayback for Done {
    async fn finished(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn stop(&mut self) {}
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    async fn start(&self, clip: &AudioClip, _muted: bool) -> Result<Box<dyn ActivePlayback>, PlaybackError> {
        self.clips.lock().unwrap().push(clip.bytes().to_vec());
        Ok(Box::new(Done))
    }
}

#[tokio::test]
async fn test_stalled_body_times_out() {
    let url = stalling_tts().await;
    let synth = HttpSynthesizer::new(url, Duration::from_secs(1)).unwrap();

    let result = tokio::time::timeout(TIMEOUT, synth.synthesize("Stalls.", AudioFormat::Mp3))
        .await
        .expect("synthesis should fail, not hang");
    assert!(matches!(result, Err(SynthesisError::Request(_))));
}

#[tokio::test]
async fn test_stalled_synthesis_does_not_block_queue() {
    let url = stalling_tts().await;
    let synth = Arc::new(HttpSynthesizer::new(url, Duration::from_secs(1)).unwrap());
    let output = Arc::new(RecordingOutput::default());
    let queue = SpeechQueue::new(synth, PlaybackController::new(output.clone()), AudioFormat::Mp3);
    let mut diagnostics = queue.subscribe();

    queue.enqueue("Stalls.");
    queue.enqueue("Should still play.");
    tokio::time::timeout(Duration::from_secs(10), queue.wait_idle())
        .await
        .expect("queue stuck behind a stalled synthesis request");

    assert_eq!(*output.clips.lock().unwrap(), vec![vec![7u8; 10]]);
    assert_eq!(queue.pending(), 0);

    let mut failed = Vec::new();
    while let Ok(d) = diagnostics.try_recv() {
        if let SpeechDiagnostic::SynthesisFailed { text, .. } = d {
            failed.push(text);
        }
    }
    assert_eq!(failed, vec!["Stalls."]);
}
