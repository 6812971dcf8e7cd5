//! Application layer for Daydream.
//!
//! Coordinates the transport, the conversation reducer and history
//! persistence into chat sessions.

pub mod chat_session;
pub mod history_sync;
pub mod session_factory;

pub use chat_session::{ChatSession, Interrupter, Responder, TurnOutcome};
pub use history_sync::{HistorySync, SyncStatus};
pub use session_factory::SessionFactory;
