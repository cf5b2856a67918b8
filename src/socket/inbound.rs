//! Inbound data path
//!
//! The transport pushes buffers through the data callback; the socket's
//! reader drains them. Buffered bytes are counted so the transport can be
//! asked to pause above the high watermark and resume at the low watermark.

use crate::metrics::{counters, labels};
use crate::transport::{ConnectionHandle, OnData, TransportClient};
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

/// Buffered byte accounting shared by the data callback and the reader
///
/// Pause and resume decisions and the matching `set_flow` calls are made
/// under one lock, so the transport sees them in the order they were taken.
pub(crate) struct InboundFlow {
    buffered: AtomicUsize,
    low: usize,
    high: usize,
    client: Weak<dyn TransportClient>,
    signal: Mutex<FlowSignal>,
}

#[derive(Debug, Default)]
struct FlowSignal {
    handle: Option<ConnectionHandle>,
    /// Pause wanted by the buffer level
    paused: bool,
    /// Last state sent to the transport
    signalled: bool,
}

impl InboundFlow {
    pub fn new(low: usize, high: usize, client: Weak<dyn TransportClient>) -> Self {
        Self {
            buffered: AtomicUsize::new(0),
            low,
            high,
            client,
            signal: Mutex::new(FlowSignal::default()),
        }
    }

    /// Count `n` bytes handed to the reader
    pub fn consumed(&self, n: usize) {
        self.buffered.fetch_sub(n, Ordering::AcqRel);
        self.update();
    }

    /// Bind the connection handle; a pause decided before it existed is sent now
    pub fn attach(&self, handle: ConnectionHandle) {
        let mut signal = self.lock();
        signal.handle = Some(handle);
        self.sync(&mut signal);
    }

    pub fn buffered(&self) -> usize {
        self.buffered.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn update(&self) {
        let mut signal = self.lock();
        let buffered = self.buffered();
        if !signal.paused && buffered > self.high {
            signal.paused = true;
        } else if signal.paused && buffered <= self.low {
            signal.paused = false;
        }
        self.sync(&mut signal);
    }

    fn sync(&self, signal: &mut FlowSignal) {
        let Some(handle) = signal.handle else {
            return;
        };
        if signal.paused == signal.signalled {
            return;
        }
        let Some(client) = self.client.upgrade() else {
            return;
        };
        signal.signalled = signal.paused;
        signal_flow(client.as_ref(), handle, signal.paused, self.buffered());
    }

    fn lock(&self) -> MutexGuard<'_, FlowSignal> {
        self.signal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for InboundFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundFlow")
            .field("buffered", &self.buffered())
            .field("low", &self.low)
            .field("high", &self.high)
            .field("signal", &*self.lock())
            .finish()
    }
}

/// Ask the transport to pause or resume inbound delivery for `handle`
fn signal_flow(client: &dyn TransportClient, handle: ConnectionHandle, paused: bool, buffered: usize) {
    if paused {
        tracing::warn!(handle = %handle, buffered, "inbound buffer above high watermark, pausing transport");
        counters::flow_signalled(labels::FLOW_PAUSE);
    } else {
        tracing::debug!(handle = %handle, buffered, "inbound buffer drained, resuming transport");
        counters::flow_signalled(labels::FLOW_RESUME);
    }
    client.set_flow(handle, paused);
}

/// Build the data callback handed to the transport's dial
///
/// Holds the only sender of the inbound queue, so the reader sees
/// end-of-stream once the transport drops the callback.
pub(crate) fn data_callback(tx: mpsc::UnboundedSender<Bytes>, flow: Arc<InboundFlow>) -> OnData {
    Box::new(move |bytes: Bytes| {
        if bytes.is_empty() {
            return;
        }
        let len = bytes.len();
        counters::bytes_received(len);

        // counted before the send so the reader never sees more consumed than queued
        flow.buffered.fetch_add(len, Ordering::AcqRel);
        if tx.send(bytes).is_err() {
            flow.buffered.fetch_sub(len, Ordering::AcqRel);
            tracing::trace!(len, "socket gone, discarding inbound data");
            return;
        }
        flow.update();
    })
}
