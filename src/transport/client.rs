//! Transport client contract

use crate::bootstrap::IdentityConfig;
use bytes::Bytes;
use std::fmt;

/// Opaque identifier of an established transport connection
///
/// Returned once by a successful dial and passed back on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    /// Wrap a raw handle value issued by the transport
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Dial completion: the new handle, or the transport's (negative) status code
pub type OnConnect = Box<dyn FnOnce(Result<ConnectionHandle, i32>) + Send + 'static>;

/// Inbound data callback, invoked once per received buffer, in order.
///
/// The transport drops this callback when the connection goes away; the
/// socket reports end-of-stream at that point.
pub type OnData = Box<dyn FnMut(Bytes) + Send + 'static>;

/// Write completion with the transport's status code (negative on failure)
pub type OnWriteComplete = Box<dyn FnOnce(i32) + Send + 'static>;

/// Init result callback. May fire more than once: intermediate codes such as
/// `ZITI_PARTIALLY_AUTHENTICATED` precede the final outcome.
pub type OnInitResult = Box<dyn FnMut(i32) + Send + 'static>;

/// Callback-driven overlay transport
///
/// One client is shared by many sockets, so implementations must accept
/// concurrent dials and writes for different handles without cross-talk.
/// Callbacks may be invoked from any thread, including synchronously from
/// inside the call that registered them.
pub trait TransportClient: Send + Sync {
    /// Request a new connection to `service`
    fn dial(&self, service: &str, is_websocket: bool, on_connect: OnConnect, on_data: OnData);

    /// Send `bytes` on `handle`; `on_complete` fires once the transport is done with them
    fn write(&self, handle: ConnectionHandle, bytes: Bytes, on_complete: OnWriteComplete);

    /// Initialize the transport with an identity.
    ///
    /// A negative return value is an immediate failure; otherwise the outcome
    /// arrives through `on_result`.
    fn init(&self, identity: &IdentityConfig, on_result: OnInitResult) -> i32;

    /// Ask the transport to stop (`paused = true`) or resume delivering inbound
    /// data for `handle`. Transports without flow control ignore it.
    fn set_flow(&self, handle: ConnectionHandle, paused: bool) {
        let _ = (handle, paused);
    }
}
