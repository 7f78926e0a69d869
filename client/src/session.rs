//! One chat session over the relay WebSocket.

use futures_util::{SinkExt, StreamExt};
use llm_core::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use tts_core::{SentenceSegmenter, SpeechQueue};

use crate::conversation::Conversation;
use crate::error::ClientError;
use crate::turn::{TurnLog, TurnOutcome, TurnState};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct Session {
    socket: Socket,
    conversation: Conversation,
    speech: SpeechQueue,
}

impl Session {
    pub async fn connect(url: &str, speech: SpeechQueue) -> Result<Self, ClientError> {
        let (socket, _) = connect_async(url).await.map_err(|source| ClientError::Connect {
            url: url.to_string(),
            source,
        })?;
        info!(url, "connected to relay");
        Ok(Self {
            socket,
            conversation: Conversation::new(),
            speech,
        })
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn speech(&self) -> &SpeechQueue {
        &self.speech
    }

    /// Send `text` with the conversation so far and follow the reply to its
    /// end. `on_event` sees every event of the turn as it arrives.
    ///
    /// A reply ending in `Error` is returned as a failed [`TurnState`]; only
    /// losing the connection is an `Err`.
    pub async fn ask<F>(&mut self, text: &str, mut on_event: F) -> Result<TurnState, ClientError>
    where
        F: FnMut(&ServerMessage),
    {
        let messages = self.conversation.with_user(text);
        debug!(turns = messages.len(), "sending ask");
        let frame = serde_json::to_string(&ClientMessage::Ask { messages })
            .map_err(|e| ClientError::Send(e.to_string()))?;
        self.socket.send(Message::Text(frame.into())).await?;

        let mut log = TurnLog::new();
        let mut segmenter = SentenceSegmenter::new();
        while !log.is_finished() {
            let event = self.next_event().await?;
            self.speak(&event, &mut segmenter);
            on_event(&event);
            log.push(event);
        }

        let state = log.state();
        match &state.outcome {
            TurnOutcome::Done => self.conversation.commit(text, &state.content),
            TurnOutcome::Failed(error) => warn!(%error, "turn failed"),
            TurnOutcome::Streaming => {}
        }
        Ok(state)
    }

    fn speak(&self, event: &ServerMessage, segmenter: &mut SentenceSegmenter) {
        if !self.speech.is_enabled() {
            return;
        }
        match event {
            ServerMessage::Chunk { text } => {
                for sentence in segmenter.feed(text) {
                    self.speech.enqueue(&sentence);
                }
            }
            ServerMessage::Done => {
                if let Some(rest) = segmenter.flush() {
                    self.speech.enqueue(&rest);
                }
            }
            ServerMessage::Ack | ServerMessage::Error { .. } => {}
        }
    }

    async fn next_event(&mut self) -> Result<ServerMessage, ClientError> {
        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str(text.as_str()) {
                    Ok(event) => return Ok(event),
                    Err(e) => warn!(error = %e, "unparseable server frame, skipping"),
                },
                Some(Ok(Message::Close(_))) | None => return Err(ClientError::Closed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.speech.stop();
        self.socket.close(None).await?;
        Ok(())
    }
}
