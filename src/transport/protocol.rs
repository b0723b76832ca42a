//! Event wire protocol.
//!
//! Events travel as length-prefixed MessagePack frames: a 4-byte big-endian
//! length followed by a [`FramedMessage`] carrying a [`Frame`]. The search
//! criteria and results inside the events stay JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version; frames from another version are rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest frame body accepted from a peer.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Default socket path, one per user.
pub fn default_socket_path() -> std::path::PathBuf {
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".into());
    // Keep only alphanumeric, dash, underscore to prevent path traversal
    let safe_user: String = user
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect();
    let safe_user = if safe_user.is_empty() {
        "unknown".to_string()
    } else {
        safe_user
    };
    std::path::PathBuf::from(format!("/tmp/inventory-report-{}.sock", safe_user))
}

/// A search request delivered by the event transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Aggregate the event belongs to; echoed in the response.
    pub aggregate_id: i32,
    /// Caller-chosen id used to match the response to this request.
    pub correlation_id: String,
    /// JSON-encoded criteria set.
    pub payload: Vec<u8>,
    /// Set when the transport failed to deliver the event intact.
    #[serde(default)]
    pub error: Option<String>,
}

impl InboundEvent {
    pub fn new(
        aggregate_id: i32,
        correlation_id: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            aggregate_id,
            correlation_id: correlation_id.into(),
            payload: payload.into(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// A search result published back through the event transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub aggregate_id: i32,
    pub correlation_id: String,
    /// JSON-encoded result payload.
    pub result: Vec<u8>,
    /// Failure description, only set when the service is configured to
    /// answer failed searches.
    #[serde(default)]
    pub error: Option<String>,
}

impl OutboundEvent {
    /// Response correlated to `event`.
    pub fn reply_to(event: &InboundEvent, result: Vec<u8>) -> Self {
        Self {
            aggregate_id: event.aggregate_id,
            correlation_id: event.correlation_id.clone(),
            result,
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Messages exchanged over a transport connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    /// Client → server: a search request.
    Query(InboundEvent),
    /// Server → client: a search result.
    Result(OutboundEvent),
}

/// Versioned wrapper around every frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramedMessage<T> {
    pub version: u32,
    pub payload: T,
}

impl<T> FramedMessage<T> {
    pub fn new(payload: T) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload,
        }
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    TooLarge(usize),

    #[error("protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode a message to MessagePack bytes with length prefix.
pub fn encode_frame<T: Serialize>(msg: &FramedMessage<T>) -> Result<Vec<u8>, FrameError> {
    let payload = rmp_serde::to_vec(msg).map_err(|e| FrameError::Encode(e.to_string()))?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(payload.len()));
    }
    let len = payload.len() as u32;
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode a message from MessagePack bytes (without length prefix).
pub fn decode_frame<T: DeserializeOwned>(data: &[u8]) -> Result<FramedMessage<T>, FrameError> {
    let msg: FramedMessage<T> =
        rmp_serde::from_slice(data).map_err(|e| FrameError::Decode(e.to_string()))?;
    if msg.version != PROTOCOL_VERSION {
        return Err(FrameError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            got: msg.version,
        });
    }
    Ok(msg)
}

/// Read one frame; `Ok(None)` when the peer closed the stream between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<FramedMessage<T>>, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    decode_frame(&payload).map(Some)
}

/// Write one frame and flush it.
pub async fn write_frame<W, T>(writer: &mut W, msg: &FramedMessage<T>) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let encoded = encode_frame(msg)?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}
