//! Error types for ziti-wire

use std::io;
use thiserror::Error;

/// Main error type for ziti-wire operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Caller passed an argument that can never be valid
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Write chunk cannot be represented as bytes
    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    /// Operation attempted in an invalid state
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// What the caller expected
        expected: String,
        /// What the adapter was in
        actual: String,
    },

    /// Transport initialization failed
    #[error("network error: {0}")]
    Network(String),

    /// Dial to a service failed
    #[error("dial to service '{service}' failed with rc {code}")]
    DialFailed {
        /// Service name that was dialed
        service: String,
        /// Status code reported by the transport
        code: i32,
    },

    /// Transport reported a failed write
    #[error("write failed with rc {0}")]
    WriteFailed(i32),

    /// Write issued after the writable side was ended
    #[error("write after end")]
    WriteAfterEnd,

    /// Operation timed out
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// Operation was cancelled before it completed
    #[error("operation cancelled")]
    Cancelled,

    /// Identity file is malformed or incomplete
    #[error("invalid identity: {0}")]
    Identity(String),

    /// JSON decoding error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short, stable label for metrics and log fields
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Config(_) => "config",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::InvalidChunk(_) => "invalid_chunk",
            Error::InvalidState { .. } => "invalid_state",
            Error::Network(_) => "network",
            Error::DialFailed { .. } => "dial_failed",
            Error::WriteFailed(_) => "write_failed",
            Error::WriteAfterEnd => "write_after_end",
            Error::Timeout(_) => "timeout",
            Error::Cancelled => "cancelled",
            Error::Identity(_) => "identity",
            Error::Json(_) => "json",
        }
    }

    /// Whether retrying the same operation on a fresh socket could succeed
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Network(_)
                | Error::DialFailed { .. }
                | Error::WriteFailed(_)
                | Error::Timeout(_)
        )
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Io(e) => e.kind(),
            Error::InvalidArgument(_) | Error::InvalidChunk(_) => io::ErrorKind::InvalidInput,
            Error::DialFailed { .. } => io::ErrorKind::ConnectionRefused,
            Error::WriteAfterEnd | Error::WriteFailed(_) => io::ErrorKind::BrokenPipe,
            Error::Timeout(_) => io::ErrorKind::TimedOut,
            Error::Cancelled => io::ErrorKind::ConnectionAborted,
            _ => io::ErrorKind::Other,
        };
        match err {
            Error::Io(e) => e,
            other => io::Error::new(kind, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DialFailed {
            service: "echo".into(),
            code: -24,
        };
        assert_eq!(err.to_string(), "dial to service 'echo' failed with rc -24");

        let err = Error::Network("ziti_init failed with rc -5".into());
        assert_eq!(err.to_string(), "network error: ziti_init failed with rc -5");
    }

    #[test]
    fn test_error_category() {
        assert_eq!(Error::WriteAfterEnd.category(), "write_after_end");
        assert_eq!(Error::Timeout("dial").category(), "timeout");
        assert_eq!(Error::InvalidChunk("bad".into()).category(), "invalid_chunk");
    }

    #[test]
    fn test_retriable() {
        assert!(Error::Timeout("write").is_retriable());
        assert!(Error::WriteFailed(-1).is_retriable());
        assert!(!Error::InvalidChunk("x".into()).is_retriable());
        assert!(!Error::Cancelled.is_retriable());
    }

    #[test]
    fn test_into_io_error_kind() {
        let io_err: io::Error = Error::WriteAfterEnd.into();
        assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe);

        let io_err: io::Error = Error::Timeout("write").into();
        assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);

        let original = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let io_err: io::Error = Error::Io(original).into();
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
