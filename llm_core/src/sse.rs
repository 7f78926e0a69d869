//! Reframing of `text/event-stream` bodies into parsed JSON records.
//!
//! Records are separated by a blank line and carry a `data: ` prefix. The
//! literal `[DONE]` ends the stream. Reads from the transport can split a
//! record anywhere (even inside a multi-byte character), so bytes are
//! buffered until a full record is available.

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::LlmError;

const DATA_PREFIX: &str = "data: ";
const SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq)]
pub enum Frame<T> {
    Record(T),
    /// The sentinel was reached. Nothing follows.
    Done,
}

enum Parsed<T> {
    Record(T),
    Done,
    Skip,
}

/// Incremental, transport-agnostic reframer.
#[derive(Debug, Default)]
pub struct Reframer {
    buffer: Vec<u8>,
    finished: bool,
}

impl Reframer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every frame they complete, in order.
    ///
    /// Once [`Frame::Done`] has been returned, later input is ignored.
    pub fn push<T: DeserializeOwned>(&mut self, bytes: &[u8]) -> Vec<Frame<T>> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }

        // CRLF framing is folded into LF framing; JSON payloads escape '\r'.
        self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        while let Some(end) = find_record_end(&self.buffer) {
            let record: Vec<u8> = self.buffer.drain(..end + 2).collect();
            match parse_record::<T>(&record[..end]) {
                Parsed::Record(value) => frames.push(Frame::Record(value)),
                Parsed::Done => {
                    self.finished = true;
                    self.buffer.clear();
                    frames.push(Frame::Done);
                    break;
                }
                Parsed::Skip => {}
            }
        }
        frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes of the trailing incomplete record.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn find_record_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_record<T: DeserializeOwned>(raw: &[u8]) -> Parsed<T> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim();
    if line.is_empty() {
        return Parsed::Skip;
    }
    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        debug!(record = %line, "skipping record without data prefix");
        return Parsed::Skip;
    };
    let data = data.trim();
    if data == SENTINEL {
        return Parsed::Done;
    }
    match serde_json::from_str::<T>(data) {
        Ok(value) => Parsed::Record(value),
        Err(e) => {
            debug!(error = %e, "skipping malformed record");
            Parsed::Skip
        }
    }
}

/// Lazily reframe a chunked byte stream.
///
/// Ends after the sentinel, or when the body ends. A transport error is
/// yielded once and terminates the stream.
pub fn reframe<T, S, B, E>(body: S) -> impl Stream<Item = Result<T, LlmError>>
where
    T: DeserializeOwned,
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<LlmError>,
{
    async_stream::stream! {
        let mut reframer = Reframer::new();
        futures::pin_mut!(body);
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };
            for frame in reframer.push::<T>(chunk.as_ref()) {
                match frame {
                    Frame::Record(record) => yield Ok(record),
                    Frame::Done => return,
                }
            }
        }
        if reframer.buffered() > 0 {
            debug!(bytes = reframer.buffered(), "body ended inside a record, discarding it");
        }
    }
}
