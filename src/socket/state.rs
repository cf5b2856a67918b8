//! Socket state machine

use crate::transport::ConnectionHandle;
use crate::{Error, Result};

/// Socket state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Created, no dial issued yet
    Unconnected,

    /// Dial issued, waiting for the transport's connect callback
    Dialing,

    /// Connection handle established
    Connected,

    /// Dial failed and the failure is surfaced to writers
    Failed,

    /// Closed locally; queued writes are cancelled
    Closed,
}

impl SocketState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: SocketState) -> bool {
        use SocketState::*;

        matches!(
            (self, next),
            (Unconnected, Dialing)
                | (Dialing, Connected)
                | (Dialing, Failed)
                | (Unconnected, Closed)
                | (Dialing, Closed)
                | (Connected, Closed)
                | (Failed, Closed)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: SocketState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }

    /// Whether the dial has settled one way or the other
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SocketState::Connected | SocketState::Failed | SocketState::Closed
        )
    }
}

impl std::fmt::Display for SocketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unconnected => write!(f, "unconnected"),
            Self::Dialing => write!(f, "dialing"),
            Self::Connected => write!(f, "connected"),
            Self::Failed => write!(f, "failed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Why a dial ended in [`SocketState::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DialFailure {
    /// Transport reported a negative status
    Refused(i32),
    /// No connect callback within the dial timeout
    TimedOut,
}

/// Snapshot published to everything waiting on the dial
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Link {
    pub state: SocketState,
    pub service: Option<String>,
    pub handle: Option<ConnectionHandle>,
    pub failure: Option<DialFailure>,
}

impl Link {
    pub fn new() -> Self {
        Self {
            state: SocketState::Unconnected,
            service: None,
            handle: None,
            failure: None,
        }
    }

    /// Turn a settled link into the handle or the error a waiter should see
    pub fn resolve(&self) -> Result<ConnectionHandle> {
        if self.state == SocketState::Closed {
            return Err(Error::Cancelled);
        }
        if let Some(handle) = self.handle {
            return Ok(handle);
        }
        match self.failure {
            Some(DialFailure::Refused(code)) => Err(Error::DialFailed {
                service: self.service.clone().unwrap_or_default(),
                code,
            }),
            Some(DialFailure::TimedOut) => Err(Error::Timeout("dial")),
            None => Err(Error::InvalidState {
                expected: "settled dial".into(),
                actual: self.state.to_string(),
            }),
        }
    }
}
