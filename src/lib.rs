//! ziti-wire: duplex streams over a callback-driven overlay transport
//!
//! The overlay transport exposes three callback primitives (dial, write and
//! init). This crate turns them into:
//!
//! * [`ZitiSocket`], a `tokio` [`AsyncRead`](tokio::io::AsyncRead) +
//!   [`AsyncWrite`](tokio::io::AsyncWrite) stream that can be written to
//!   before its dial has completed
//! * a one-time bootstrap hook ([`bootstrap::ziti_init`]) for database driver
//!   clients
//! * [`ZitiClient`], which ties one shared transport, its identity and the
//!   socket defaults together
//!
//! The overlay protocol itself lives behind [`transport::TransportClient`].
//! [`transport::MemoryTransport`] implements it in-process.

pub mod bootstrap;
pub mod client;
pub mod error;
pub mod metrics;
pub mod socket;
pub mod transport;

pub use client::ZitiClient;
pub use error::{Error, Result};
pub use socket::{Chunk, Encoding, ErrorPolicy, SocketConfig, SocketState, WriteCompletion, ZitiSocket};
pub use transport::{ConnectionHandle, TransportClient};
