use super::{StreamHandler, StreamOutcome};
use bytes::Bytes;
use daydream_core::{DaydreamError, Frame, FrameDecoder};
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Enforces at most one terminal callback and nothing after it.
struct TerminalGuard<H> {
    handler: H,
    finished: bool,
}

impl<H: StreamHandler> TerminalGuard<H> {
    fn new(handler: H) -> Self {
        Self {
            handler,
            finished: false,
        }
    }

    fn delta(&mut self, text: String) {
        if !self.finished {
            self.handler.on_delta(text);
        }
    }

    fn done(&mut self) -> StreamOutcome {
        if !self.finished {
            self.finished = true;
            self.handler.on_done();
        }
        StreamOutcome::Completed
    }

    fn error(&mut self, error: DaydreamError) -> StreamOutcome {
        if !self.finished {
            self.finished = true;
            self.handler.on_error(error);
        }
        StreamOutcome::Failed
    }
}

/// Reads `body` to completion, reporting decoded frames to `handler`.
///
/// The loop ends on the first of:
/// - an `event: done` frame or the end of the body: `on_done`
/// - a body read error or `idle_timeout` without any bytes: `on_error`
/// - `cancel` being triggered: no callback
///
/// Frames that follow the terminal frame in the same chunk are ignored.
pub async fn drive_stream<S, H>(
    body: S,
    handler: H,
    cancel: CancellationToken,
    idle_timeout: Duration,
) -> StreamOutcome
where
    S: Stream<Item = Result<Bytes, DaydreamError>> + Unpin,
    H: StreamHandler,
{
    let mut body = body;
    let mut guard = TerminalGuard::new(handler);
    let mut decoder = FrameDecoder::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamOutcome::Cancelled,
            next = timeout(idle_timeout, body.next()) => next,
        };

        let chunk = match next {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => {
                tracing::debug!("[StreamClient] Body read failed: {}", e);
                return guard.error(e);
            }
            Ok(None) => {
                // Body ended without an explicit terminator
                decoder.finish();
                return guard.done();
            }
            Err(_) => {
                tracing::warn!(
                    "[StreamClient] No data for {:?}, abandoning stream",
                    idle_timeout
                );
                return guard.error(DaydreamError::transport(format!(
                    "idle timeout: no data received for {}s",
                    idle_timeout.as_secs_f32()
                )));
            }
        };

        for frame in decoder.push(&chunk) {
            if cancel.is_cancelled() {
                return StreamOutcome::Cancelled;
            }
            match frame {
                Frame::Delta(text) if text.is_empty() => {
                    tracing::trace!("[StreamClient] Skipping empty data frame");
                }
                Frame::Delta(text) => guard.delta(text),
                Frame::Done => return guard.done(),
                Frame::Ignored => {}
            }
        }
    }
}
