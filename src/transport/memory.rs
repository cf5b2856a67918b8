//! In-process transport
//!
//! `MemoryTransport` implements [`TransportClient`] without any network. Services
//! are registered by name and either echo writes back as inbound data or swallow
//! them. Dials, writes and init results can be held and released by hand, which
//! makes every suspension point of a socket observable from a test.

use super::client::{
    ConnectionHandle, OnConnect, OnData, OnInitResult, OnWriteComplete, TransportClient,
};
use super::constants::{memory as codes, ZITI_OK};
use crate::bootstrap::IdentityConfig;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What a registered service does with written bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceBehavior {
    /// Deliver every write back as inbound data
    Echo,
    /// Accept writes and discard them
    Sink,
}

/// A write forwarded to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    /// Handle the write was issued against
    pub handle: ConnectionHandle,
    /// Payload
    pub bytes: Bytes,
}

/// A dial request received by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDial {
    /// Requested service
    pub service: String,
    /// Websocket flag passed by the caller
    pub is_websocket: bool,
}

type SharedOnData = Arc<Mutex<OnData>>;

struct OpenConnection {
    behavior: ServiceBehavior,
    on_data: SharedOnData,
}

struct ParkedDial {
    service: String,
    on_connect: OnConnect,
    on_data: SharedOnData,
}

#[derive(Default)]
struct State {
    services: HashMap<String, ServiceBehavior>,
    dial_failures: HashMap<String, i32>,
    hold_dials: bool,
    parked_dials: VecDeque<ParkedDial>,
    connections: HashMap<ConnectionHandle, OpenConnection>,
    hold_writes: bool,
    parked_writes: VecDeque<OnWriteComplete>,
    write_status: i32,
    writes: Vec<RecordedWrite>,
    dials: Vec<RecordedDial>,
    flow: Vec<(ConnectionHandle, bool)>,
    init_return: i32,
    init_results: Vec<i32>,
    init_callback: Option<OnInitResult>,
    init_controllers: Vec<String>,
}

/// In-process [`TransportClient`]
///
/// # Examples
///
/// ```
/// use ziti_wire::transport::{MemoryTransport, ServiceBehavior};
///
/// let transport = MemoryTransport::new().with_service("echo", ServiceBehavior::Echo);
/// assert!(transport.dials().is_empty());
/// ```
pub struct MemoryTransport {
    state: Mutex<State>,
    next_handle: AtomicU64,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Create a transport with no registered services
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                write_status: ZITI_OK,
                init_return: ZITI_OK,
                ..State::default()
            }),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Register a service (builder form)
    pub fn with_service(self, name: impl Into<String>, behavior: ServiceBehavior) -> Self {
        self.register_service(name, behavior);
        self
    }

    /// Register a service
    pub fn register_service(&self, name: impl Into<String>, behavior: ServiceBehavior) {
        self.lock().services.insert(name.into(), behavior);
    }

    /// Make every dial to `service` fail with `code`
    pub fn fail_dials_to(&self, service: impl Into<String>, code: i32) {
        self.lock().dial_failures.insert(service.into(), code);
    }

    /// Park incoming dials until released with [`complete_next_dial`](Self::complete_next_dial)
    /// or [`fail_next_dial`](Self::fail_next_dial)
    pub fn hold_dials(&self, hold: bool) {
        self.lock().hold_dials = hold;
    }

    /// Number of dials waiting to be released
    pub fn parked_dial_count(&self) -> usize {
        self.lock().parked_dials.len()
    }

    /// Resolve the oldest parked dial as if the network answered now
    ///
    /// Returns `None` when no dial is parked.
    pub fn complete_next_dial(&self) -> Option<Result<ConnectionHandle, i32>> {
        let mut state = self.lock();
        let parked = state.parked_dials.pop_front()?;
        let outcome = self.open(&mut state, &parked.service, parked.on_data);
        drop(state);
        (parked.on_connect)(outcome);
        Some(outcome)
    }

    /// Fail the oldest parked dial with `code`
    pub fn fail_next_dial(&self, code: i32) -> bool {
        let parked = match self.lock().parked_dials.pop_front() {
            Some(parked) => parked,
            None => return false,
        };
        drop(parked.on_data);
        (parked.on_connect)(Err(code));
        true
    }

    /// Push inbound bytes through the oldest parked dial's data callback,
    /// before its connect callback has fired
    pub fn deliver_to_parked_dial(&self, bytes: impl Into<Bytes>) -> bool {
        let on_data = match self.lock().parked_dials.front() {
            Some(parked) => Arc::clone(&parked.on_data),
            None => return false,
        };
        let mut on_data = on_data.lock().unwrap_or_else(PoisonError::into_inner);
        (on_data)(bytes.into());
        true
    }

    /// Park write completions until released with
    /// [`complete_next_write`](Self::complete_next_write)
    pub fn hold_writes(&self, hold: bool) {
        self.lock().hold_writes = hold;
    }

    /// Number of writes whose completion is parked
    pub fn parked_write_count(&self) -> usize {
        self.lock().parked_writes.len()
    }

    /// Signal completion of the oldest parked write with `status`
    pub fn complete_next_write(&self, status: i32) -> bool {
        let on_complete = match self.lock().parked_writes.pop_front() {
            Some(on_complete) => on_complete,
            None => return false,
        };
        on_complete(status);
        true
    }

    /// Complete every subsequent write with `status`
    pub fn fail_writes_with(&self, status: i32) {
        self.lock().write_status = status;
    }

    /// Push inbound bytes to the socket that owns `handle`
    pub fn deliver(&self, handle: ConnectionHandle, bytes: impl Into<Bytes>) -> bool {
        let on_data = match self.lock().connections.get(&handle) {
            Some(conn) => Arc::clone(&conn.on_data),
            None => return false,
        };
        let mut on_data = on_data.lock().unwrap_or_else(PoisonError::into_inner);
        (on_data)(bytes.into());
        true
    }

    /// Close the connection from the remote side; the socket's reader sees end-of-stream
    pub fn hang_up(&self, handle: ConnectionHandle) -> bool {
        let removed = self.lock().connections.remove(&handle);
        removed.is_some()
    }

    /// Every write forwarded so far, in order
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.lock().writes.clone()
    }

    /// Every dial received so far, in order
    pub fn dials(&self) -> Vec<RecordedDial> {
        self.lock().dials.clone()
    }

    /// Flow-control signals received, in order
    pub fn flow_events(&self) -> Vec<(ConnectionHandle, bool)> {
        self.lock().flow.clone()
    }

    /// Number of open connections
    pub fn open_connections(&self) -> usize {
        self.lock().connections.len()
    }

    /// Synchronous return code of subsequent `init` calls
    pub fn set_init_return(&self, code: i32) {
        self.lock().init_return = code;
    }

    /// Codes delivered through the init callback, in order, during `init`
    pub fn script_init_results(&self, codes: Vec<i32>) {
        self.lock().init_results = codes;
    }

    /// Deliver another code through the most recent init callback
    pub fn emit_init_result(&self, code: i32) -> bool {
        let mut callback = match self.lock().init_callback.take() {
            Some(callback) => callback,
            None => return false,
        };
        callback(code);
        let mut state = self.lock();
        if state.init_callback.is_none() {
            state.init_callback = Some(callback);
        }
        true
    }

    /// Number of `init` calls received
    pub fn init_calls(&self) -> usize {
        self.lock().init_controllers.len()
    }

    /// Controller URLs passed to `init`, in order
    pub fn init_controllers(&self) -> Vec<String> {
        self.lock().init_controllers.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(
        &self,
        state: &mut State,
        service: &str,
        on_data: SharedOnData,
    ) -> Result<ConnectionHandle, i32> {
        if let Some(code) = state.dial_failures.get(service) {
            return Err(*code);
        }
        let behavior = match state.services.get(service) {
            Some(behavior) => *behavior,
            None => return Err(codes::SERVICE_UNAVAILABLE),
        };
        let handle = ConnectionHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        state.connections.insert(
            handle,
            OpenConnection { behavior, on_data },
        );
        Ok(handle)
    }
}

impl TransportClient for MemoryTransport {
    fn dial(&self, service: &str, is_websocket: bool, on_connect: OnConnect, on_data: OnData) {
        let on_data: SharedOnData = Arc::new(Mutex::new(on_data));
        let mut state = self.lock();
        state.dials.push(RecordedDial {
            service: service.to_string(),
            is_websocket,
        });

        if state.hold_dials {
            state.parked_dials.push_back(ParkedDial {
                service: service.to_string(),
                on_connect,
                on_data,
            });
            return;
        }

        let outcome = self.open(&mut state, service, on_data);
        drop(state);
        on_connect(outcome);
    }

    fn write(&self, handle: ConnectionHandle, bytes: Bytes, on_complete: OnWriteComplete) {
        let mut state = self.lock();
        state.writes.push(RecordedWrite {
            handle,
            bytes: bytes.clone(),
        });

        let echo = match state.connections.get(&handle) {
            Some(conn) if conn.behavior == ServiceBehavior::Echo => Some(Arc::clone(&conn.on_data)),
            Some(_) => None,
            None => {
                drop(state);
                on_complete(codes::CONNECTION_CLOSED);
                return;
            }
        };

        let status = state.write_status;
        let on_complete = if state.hold_writes {
            state.parked_writes.push_back(on_complete);
            None
        } else {
            Some(on_complete)
        };
        drop(state);

        if status >= 0 {
            if let Some(on_data) = echo {
                let mut on_data = on_data.lock().unwrap_or_else(PoisonError::into_inner);
                (on_data)(bytes);
            }
        }
        if let Some(on_complete) = on_complete {
            on_complete(status);
        }
    }

    fn init(&self, identity: &IdentityConfig, on_result: OnInitResult) -> i32 {
        let mut state = self.lock();
        state.init_controllers.push(identity.controller_url.clone());
        let rc = state.init_return;
        if rc < 0 {
            return rc;
        }
        let scripted = state.init_results.clone();
        drop(state);

        let mut on_result = on_result;
        for code in scripted {
            on_result(code);
        }
        self.lock().init_callback = Some(on_result);
        rc
    }

    fn set_flow(&self, handle: ConnectionHandle, paused: bool) {
        self.lock().flow.push((handle, paused));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn connect(transport: &MemoryTransport, service: &str) -> (Result<ConnectionHandle, i32>, mpsc::Receiver<Bytes>) {
        let (conn_tx, conn_rx) = mpsc::channel();
        let (data_tx, data_rx) = mpsc::channel();
        transport.dial(
            service,
            false,
            Box::new(move |outcome| {
                let _ = conn_tx.send(outcome);
            }),
            Box::new(move |bytes| {
                let _ = data_tx.send(bytes);
            }),
        );
        (conn_rx.recv().expect("dial outcome"), data_rx)
    }

    #[test]
    fn test_dial_registered_service() {
        let transport = MemoryTransport::new().with_service("echo", ServiceBehavior::Echo);
        let (outcome, _data) = connect(&transport, "echo");
        assert!(outcome.is_ok());
        assert_eq!(transport.open_connections(), 1);
        assert_eq!(
            transport.dials(),
            vec![RecordedDial {
                service: "echo".into(),
                is_websocket: false
            }]
        );
    }

    #[test]
    fn test_dial_unknown_service() {
        let transport = MemoryTransport::new();
        let (outcome, data) = connect(&transport, "missing");
        assert_eq!(outcome, Err(codes::SERVICE_UNAVAILABLE));
        // on_data was dropped with the failed dial
        assert!(data.recv().is_err());
    }

    #[test]
    fn test_echo_write_delivers_and_completes() {
        let transport = MemoryTransport::new().with_service("echo", ServiceBehavior::Echo);
        let (outcome, data) = connect(&transport, "echo");
        let handle = outcome.unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        transport.write(
            handle,
            Bytes::from_static(b"ping"),
            Box::new(move |status| {
                let _ = done_tx.send(status);
            }),
        );

        assert_eq!(data.recv().unwrap(), Bytes::from_static(b"ping"));
        assert_eq!(done_rx.recv().unwrap(), ZITI_OK);
    }

    #[test]
    fn test_held_dial_and_write() {
        let transport = MemoryTransport::new().with_service("sink", ServiceBehavior::Sink);
        transport.hold_dials(true);

        let (conn_tx, conn_rx) = mpsc::channel();
        transport.dial(
            "sink",
            false,
            Box::new(move |outcome| {
                let _ = conn_tx.send(outcome);
            }),
            Box::new(|_| {}),
        );
        assert!(conn_rx.try_recv().is_err());
        assert_eq!(transport.parked_dial_count(), 1);

        let handle = transport.complete_next_dial().unwrap().unwrap();
        assert_eq!(conn_rx.recv().unwrap(), Ok(handle));

        transport.hold_writes(true);
        let (done_tx, done_rx) = mpsc::channel();
        transport.write(
            handle,
            Bytes::from_static(b"x"),
            Box::new(move |status| {
                let _ = done_tx.send(status);
            }),
        );
        assert!(done_rx.try_recv().is_err());
        assert!(transport.complete_next_write(-3));
        assert_eq!(done_rx.recv().unwrap(), -3);
    }

    #[test]
    fn test_deliver_before_connect() {
        let transport = MemoryTransport::new().with_service("echo", ServiceBehavior::Echo);
        assert!(!transport.deliver_to_parked_dial(Bytes::from_static(b"early")));
        transport.hold_dials(true);

        let (data_tx, data_rx) = mpsc::channel();
        transport.dial(
            "echo",
            false,
            Box::new(|_| {}),
            Box::new(move |bytes| {
                let _ = data_tx.send(bytes);
            }),
        );
        assert!(transport.deliver_to_parked_dial(Bytes::from_static(b"early")));
        assert_eq!(data_rx.recv().unwrap(), Bytes::from_static(b"early"));

        let handle = transport.complete_next_dial().unwrap().unwrap();
        assert!(transport.deliver(handle, Bytes::from_static(b"late")));
        assert_eq!(data_rx.recv().unwrap(), Bytes::from_static(b"late"));
    }

    #[test]
    fn test_write_to_closed_handle() {
        let transport = MemoryTransport::new().with_service("sink", ServiceBehavior::Sink);
        let (outcome, _data) = connect(&transport, "sink");
        let handle = outcome.unwrap();
        assert!(transport.hang_up(handle));

        let (done_tx, done_rx) = mpsc::channel();
        transport.write(
            handle,
            Bytes::from_static(b"late"),
            Box::new(move |status| {
                let _ = done_tx.send(status);
            }),
        );
        assert_eq!(done_rx.recv().unwrap(), codes::CONNECTION_CLOSED);
    }

    #[test]
    fn test_hang_up_drops_data_callback() {
        let transport = MemoryTransport::new().with_service("echo", ServiceBehavior::Echo);
        let (outcome, data) = connect(&transport, "echo");
        let handle = outcome.unwrap();
        assert!(transport.deliver(handle, Bytes::from_static(b"a")));
        assert!(transport.hang_up(handle));
        assert_eq!(data.recv().unwrap(), Bytes::from_static(b"a"));
        assert!(data.recv().is_err());
        assert!(!transport.deliver(handle, Bytes::from_static(b"b")));
    }
}
