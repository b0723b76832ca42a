//! Event server: accepts search requests over a Unix Domain Socket and
//! streams results back on the same connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::protocol::{Frame, FrameError, FramedMessage, read_frame, write_frame};
use crate::handler::RequestHandler;
use crate::service::dispatch;

/// Events buffered per connection in each direction.
const CONNECTION_QUEUE_DEPTH: usize = 64;

/// Configuration for the event server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the Unix socket.
    pub socket_path: PathBuf,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

/// Event server state.
pub struct EventServer {
    config: ServerConfig,
    handler: RequestHandler,
    start_time: Instant,
    total_events: Arc<AtomicU64>,
    active_connections: Arc<AtomicUsize>,
    shutdown: watch::Sender<bool>,
}

impl EventServer {
    pub fn new(config: ServerConfig, handler: RequestHandler) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            handler,
            start_time: Instant::now(),
            total_events: Arc::new(AtomicU64::new(0)),
            active_connections: Arc::new(AtomicUsize::new(0)),
            shutdown,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Events received since the server was created.
    pub fn total_events(&self) -> u64 {
        self.total_events.load(Ordering::Relaxed)
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Ask a running server to stop. Connections stop reading new events,
    /// finish the searches already in flight, then close.
    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Serve until [`request_shutdown`](Self::request_shutdown) or Ctrl-C.
    pub async fn run(&self) -> std::io::Result<()> {
        // Remove stale socket if exists
        if self.config.socket_path.exists() {
            std::fs::remove_file(&self.config.socket_path)?;
        }

        if let Some(parent) = self.config.socket_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.config.socket_path)?;
        info!(
            socket = %self.config.socket_path.display(),
            max_connections = self.config.max_connections,
            policy = %self.handler.policy(),
            "Event server listening"
        );

        let mut shutdown = self.shutdown.subscribe();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = stop_requested(&mut shutdown) => {
                    info!("Shutdown requested, stopping event server");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping event server");
                    self.request_shutdown();
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => self.admit(stream, &mut connections),
                    Err(e) => {
                        error!(error = %e, "Accept error");
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Connection task failed");
                    }
                }
            }
        }

        drop(listener);
        while connections.join_next().await.is_some() {}

        // Cleanup
        if self.config.socket_path.exists() {
            let _ = std::fs::remove_file(&self.config.socket_path);
        }

        info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            total_events = self.total_events(),
            "Event server stopped"
        );
        Ok(())
    }

    fn admit(&self, stream: UnixStream, connections: &mut JoinSet<()>) {
        let active = self.active_connections.fetch_add(1, Ordering::SeqCst);
        if active >= self.config.max_connections {
            self.active_connections.fetch_sub(1, Ordering::SeqCst);
            warn!(
                active = active,
                max = self.config.max_connections,
                "Max connections reached, rejecting"
            );
            return;
        }

        let guard = ConnectionGuard(Arc::clone(&self.active_connections));
        let handler = self.handler.clone();
        let shutdown = self.shutdown.subscribe();
        let total_events = Arc::clone(&self.total_events);
        connections.spawn(async move {
            let _guard = guard;
            if let Err(e) = serve_connection(stream, handler, shutdown, total_events).await {
                debug!(error = %e, "Connection error");
            }
        });
    }
}

/// Resolve once shutdown has been requested.
///
/// The `watch::Ref` returned by `wait_for` holds a read lock; it is released
/// here so no select arm keeps it across an await.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Read `Query` frames into a per-connection dispatcher and write its
/// replies back as `Result` frames.
async fn serve_connection(
    stream: UnixStream,
    handler: RequestHandler,
    mut shutdown: watch::Receiver<bool>,
    total_events: Arc<AtomicU64>,
) -> Result<(), FrameError> {
    let (mut reader, mut writer) = stream.into_split();
    let (inbound_tx, inbound_rx) = mpsc::channel(CONNECTION_QUEUE_DEPTH);
    let (outbound_tx, mut outbound_rx) = mpsc::channel(CONNECTION_QUEUE_DEPTH);

    let dispatcher = tokio::spawn(dispatch(handler, inbound_rx, outbound_tx));
    let replies = tokio::spawn(async move {
        while let Some(reply) = outbound_rx.recv().await {
            write_frame(&mut writer, &FramedMessage::new(Frame::Result(reply))).await?;
        }
        Ok::<_, FrameError>(())
    });

    let read_result = loop {
        tokio::select! {
            _ = stop_requested(&mut shutdown) => break Ok(()),
            frame = read_frame::<_, Frame>(&mut reader) => match frame {
                Ok(None) => {
                    debug!("Client disconnected");
                    break Ok(());
                }
                Ok(Some(msg)) => match msg.payload {
                    Frame::Query(event) => {
                        total_events.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            aggregate_id = event.aggregate_id,
                            correlation_id = %event.correlation_id,
                            "Received search request"
                        );
                        if inbound_tx.send(event).await.is_err() {
                            break Ok(());
                        }
                    }
                    Frame::Result(_) => {
                        warn!("Client sent a result frame, ignoring");
                    }
                },
                Err(e) => break Err(e),
            }
        }
    };

    // Closing the inbound side lets the dispatcher drain in-flight searches,
    // which in turn closes the reply channel and ends the writer.
    drop(inbound_tx);
    if let Err(e) = dispatcher.await {
        warn!(error = %e, "Dispatcher task failed");
    }
    match replies.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Failed to deliver replies"),
        Err(e) => warn!(error = %e, "Reply writer task failed"),
    }

    read_result
}
