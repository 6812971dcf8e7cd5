//! Core domain of the Daydream chat client.
//!
//! Everything in this crate is free of I/O: the wire frame decoder, the
//! conversation reducer, message and configuration types, and the traits the
//! outer layers implement.

pub mod config;
pub mod conversation;
pub mod error;
pub mod frame;
pub mod history;
pub mod image;
pub mod message;

// Re-export common types
pub use config::{ClientConfig, HistoryBackend};
pub use conversation::{
    Conversation, MessageView, PlainTextRenderer, RenderAnnex, Renderer, TurnEnd,
};
pub use error::{DaydreamError, Result};
pub use frame::{Frame, FrameDecoder};
pub use history::{HistoryStore, NoOpHistoryStore};
pub use message::{ChatRequest, ImageRef, Message, Role};
