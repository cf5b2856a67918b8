//! Stream adapter over the transport
//!
//! This module handles:
//! * Lazy dialing and the connection state machine
//! * Ordered, serialized forwarding of writes once the handle exists
//! * Inbound buffering with pause/resume signalling to the transport
//! * Text chunk encodings and socket configuration

mod chunk;
mod config;
mod inbound;
mod state;
mod writer;
mod ziti_socket;

pub use chunk::{Chunk, Encoding};
pub use config::{ErrorPolicy, SocketConfig, SocketConfigBuilder};
pub use state::SocketState;
pub use ziti_socket::{WriteCompletion, ZitiSocket};
