//! Terminal voice-chat client for the relay server.
//!
//! A [`Session`] sends the conversation over the relay WebSocket, folds the
//! streamed reply into a per-turn log and, with voice on, speaks each
//! sentence as soon as it completes.

pub mod command;
pub mod config;
pub mod conversation;
pub mod error;
pub mod session;
pub mod speech;
pub mod turn;

pub use command::Command;
pub use config::{ClientConfig, OutputKind};
pub use conversation::Conversation;
pub use error::ClientError;
pub use session::Session;
pub use speech::build_speech_queue;
pub use turn::{reduce, TurnLog, TurnOutcome, TurnState};
