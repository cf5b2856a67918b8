//! Transport status codes

/// Operation succeeded
pub const ZITI_OK: i32 = 0;

/// Controller accepted the identity but still requires additional
/// authentication; reported through the init callback before the final
/// outcome and never terminal on its own.
pub const ZITI_PARTIALLY_AUTHENTICATED: i32 = -30;

/// Codes reported by [`MemoryTransport`](super::MemoryTransport)
pub mod memory {
    /// Dialed service is not registered
    pub const SERVICE_UNAVAILABLE: i32 = -11;

    /// Write issued against a handle that is no longer open
    pub const CONNECTION_CLOSED: i32 = -14;
}

/// Whether `code` reports a failure
pub fn is_error(code: i32) -> bool {
    code < 0
}
