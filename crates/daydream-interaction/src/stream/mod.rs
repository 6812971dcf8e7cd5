//! Push-over-POST streaming transport.
//!
//! A chat turn is a single `POST` whose chunked response body carries
//! `data:` frames until `event: done`. [`StreamClient::open`] spawns a worker
//! that reads the body, decodes frames and reports them to a
//! [`StreamHandler`]:
//!
//! - `on_delta` fires once per content frame, in arrival order
//! - exactly one of `on_done` / `on_error` fires, unless the stream is
//!   cancelled, in which case neither does
//! - nothing fires after the terminal callback
//!
//! The decode loop itself lives in [`drive_stream`] and works on any byte
//! stream, which keeps the protocol logic testable without a server.

mod client;
mod driver;

pub use client::StreamClient;
pub use driver::drive_stream;

use daydream_core::DaydreamError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Receiver of stream callbacks.
///
/// Callbacks run on the stream worker task and should return quickly.
pub trait StreamHandler: Send + 'static {
    fn on_delta(&mut self, text: String);
    fn on_done(&mut self);
    fn on_error(&mut self, error: DaydreamError);
}

/// Stream callbacks as values, for consumers that prefer a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
    Error(DaydreamError),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Delta(_))
    }
}

/// Forwards callbacks into an unbounded channel.
///
/// When the stream is cancelled the sender is dropped without a terminal
/// event, so the receiver observes `None`.
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: StreamEvent) {
        // Receiver gone means nobody is listening anymore
        let _ = self.tx.send(event);
    }
}

impl StreamHandler for ChannelHandler {
    fn on_delta(&mut self, text: String) {
        self.send(StreamEvent::Delta(text));
    }

    fn on_done(&mut self) {
        self.send(StreamEvent::Done);
    }

    fn on_error(&mut self, error: DaydreamError) {
        self.send(StreamEvent::Error(error));
    }
}

/// Closure-based handler built by [`callbacks`].
pub struct Callbacks<D, F, E> {
    on_delta: D,
    on_done: F,
    on_error: E,
}

/// Builds a [`StreamHandler`] from three closures.
pub fn callbacks<D, F, E>(on_delta: D, on_done: F, on_error: E) -> Callbacks<D, F, E>
where
    D: FnMut(String) + Send + 'static,
    F: FnMut() + Send + 'static,
    E: FnMut(DaydreamError) + Send + 'static,
{
    Callbacks {
        on_delta,
        on_done,
        on_error,
    }
}

impl<D, F, E> StreamHandler for Callbacks<D, F, E>
where
    D: FnMut(String) + Send + 'static,
    F: FnMut() + Send + 'static,
    E: FnMut(DaydreamError) + Send + 'static,
{
    fn on_delta(&mut self, text: String) {
        (self.on_delta)(text)
    }

    fn on_done(&mut self) {
        (self.on_done)()
    }

    fn on_error(&mut self, error: DaydreamError) {
        (self.on_error)(error)
    }
}

/// How a stream session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// `on_done` was called.
    Completed,
    /// `on_error` was called.
    Failed,
    /// Cancelled by the caller; no terminal callback was called.
    Cancelled,
}

/// Cloneable cancellation handle for a stream session.
#[derive(Debug, Clone)]
pub struct StreamCanceller {
    token: CancellationToken,
}

impl StreamCanceller {
    /// Cancels the session. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Handle to a running stream session.
///
/// Dropping the handle detaches the worker; it keeps delivering callbacks
/// until the stream ends. Call [`StreamHandle::cancel`] to stop it.
#[derive(Debug)]
pub struct StreamHandle {
    id: String,
    token: CancellationToken,
    task: JoinHandle<StreamOutcome>,
}

impl StreamHandle {
    pub(crate) fn new(id: String, token: CancellationToken, task: JoinHandle<StreamOutcome>) -> Self {
        Self { id, token, task }
    }

    /// Session id used in log lines.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Aborts the request. No callback fires afterwards. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn canceller(&self) -> StreamCanceller {
        StreamCanceller {
            token: self.token.clone(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the worker to finish.
    pub async fn join(self) -> StreamOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("[StreamClient] Stream worker {} panicked: {}", self.id, e);
                StreamOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_handler_forwards_events() {
        let (mut handler, mut rx) = ChannelHandler::new();
        handler.on_delta("a".to_string());
        handler.on_done();
        drop(handler);

        assert_eq!(rx.try_recv().unwrap(), StreamEvent::Delta("a".to_string()));
        let done = rx.try_recv().unwrap();
        assert!(done.is_terminal());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_callbacks_handler() {
        use std::sync::{Arc, Mutex};

        let log = Arc::new(Mutex::new(Vec::new()));
        let (d, f, e) = (log.clone(), log.clone(), log.clone());
        let mut handler = callbacks(
            move |t| d.lock().unwrap().push(format!("delta:{t}")),
            move || f.lock().unwrap().push("done".to_string()),
            move |err| e.lock().unwrap().push(format!("error:{err}")),
        );
        handler.on_delta("x".to_string());
        handler.on_error(DaydreamError::transport("boom"));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["delta:x".to_string(), "error:Transport error: boom".to_string()]
        );
    }
}
