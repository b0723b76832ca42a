//! Event client for publishing search requests to a running server.

use std::path::Path;
use std::time::Duration;

use tokio::net::UnixStream;
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::protocol::{
    Frame, FrameError, FramedMessage, InboundEvent, OutboundEvent, read_frame, write_frame,
};

/// Results buffered between the socket reader and [`EventClient::next_result`].
const RESULT_QUEUE_DEPTH: usize = 64;

/// A connection to an [`EventServer`](super::EventServer).
///
/// Results are read by a background task, so waiting for one with a timeout
/// never leaves a frame half-consumed on the socket.
pub struct EventClient {
    writer: OwnedWriteHalf,
    results: mpsc::Receiver<Result<OutboundEvent, FrameError>>,
    reader: JoinHandle<()>,
}

impl EventClient {
    /// Connect to the server socket at `path`, giving up after `timeout`.
    pub async fn connect(path: &Path, timeout: Duration) -> Result<Self, FrameError> {
        let stream = match tokio::time::timeout(timeout, UnixStream::connect(path)).await {
            Ok(stream) => stream?,
            Err(_) => {
                return Err(FrameError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connecting to {} timed out", path.display()),
                )));
            }
        };
        debug!(socket = %path.display(), "Connected to event server");

        let (mut reader, writer) = stream.into_split();
        let (tx, results) = mpsc::channel(RESULT_QUEUE_DEPTH);
        let reader = tokio::spawn(async move {
            loop {
                let item = match read_frame::<_, Frame>(&mut reader).await {
                    Ok(None) => break,
                    Ok(Some(msg)) => match msg.payload {
                        Frame::Result(event) => Ok(event),
                        Frame::Query(_) => {
                            warn!("Server sent a query frame, ignoring");
                            continue;
                        }
                    },
                    Err(e) => Err(e),
                };
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });

        Ok(Self {
            writer,
            results,
            reader,
        })
    }

    /// Send one search request.
    pub async fn publish(&mut self, event: &InboundEvent) -> Result<(), FrameError> {
        write_frame(&mut self.writer, &FramedMessage::new(Frame::Query(event.clone()))).await
    }

    /// Wait up to `timeout` for the next result.
    ///
    /// `Ok(None)` means nothing arrived in time. A silently dropped request
    /// looks exactly like a slow one from here.
    pub async fn next_result(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<OutboundEvent>, FrameError> {
        match tokio::time::timeout(timeout, self.results.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(item)) => item.map(Some),
            Ok(None) => Err(FrameError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "event server closed the connection",
            ))),
        }
    }
}

impl Drop for EventClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
