//! HTTP collaborators of the Daydream client.
//!
//! Every type here talks to the backend over `reqwest`; nothing in this crate
//! mutates conversation state.

pub mod chat_api_client;
pub mod http;
pub mod image_api_client;
pub mod memory_store;
pub mod stream;

pub use chat_api_client::ChatApiClient;
pub use image_api_client::ImageApiClient;
pub use memory_store::HttpHistoryStore;
pub use stream::{
    callbacks, ChannelHandler, StreamCanceller, StreamClient, StreamEvent, StreamHandle,
    StreamHandler, StreamOutcome,
};
