//! Transport client seam
//!
//! This module handles:
//! * The callback-driven `TransportClient` contract (dial/write/init)
//! * Opaque connection handles
//! * Status codes shared by all transport implementations
//! * An in-process transport for tests and demos

mod client;
pub mod constants;
mod memory;

pub use client::{
    ConnectionHandle, OnConnect, OnData, OnInitResult, OnWriteComplete, TransportClient,
};
pub use memory::{MemoryTransport, RecordedDial, RecordedWrite, ServiceBehavior};
