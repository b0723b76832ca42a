//! Event transport: framed search requests and results over a Unix socket.
//!
//! - **[`protocol`]**: event types and the length-prefixed MessagePack framing.
//! - **[`server`]**: [`EventServer`], feeding each connection through the dispatcher.
//! - **[`client`]**: [`EventClient`], used by the `send` command and tests.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::EventClient;
pub use protocol::{
    Frame, FrameError, FramedMessage, InboundEvent, MAX_FRAME_LEN, OutboundEvent,
    PROTOCOL_VERSION, decode_frame, default_socket_path, encode_frame, read_frame, write_frame,
};
pub use server::{EventServer, ServerConfig};
