//! Per-socket write queue
//!
//! Every write is queued in submission order and drained by a single task,
//! which waits for the connection handle, forwards one write to the
//! transport and waits for its completion before touching the next. Bytes
//! therefore reach the connection in the order they were written, even when
//! they were written before the dial finished.

use super::config::ErrorPolicy;
use super::state::Link;
use crate::metrics::{counters, histograms, labels};
use crate::transport::{constants, ConnectionHandle, TransportClient};
use crate::{Error, Result};
use bytes::Bytes;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};

/// Entry in the write queue
pub(crate) enum WriteRequest {
    /// Bytes to forward
    Data {
        bytes: Bytes,
        reply: oneshot::Sender<Result<()>>,
        queued_at: Instant,
    },
    /// Answered once every earlier entry has been handled
    Barrier(oneshot::Sender<()>),
}

pub(crate) struct Writer {
    client: Arc<dyn TransportClient>,
    link: watch::Receiver<Link>,
    queue: mpsc::UnboundedReceiver<WriteRequest>,
    policy: ErrorPolicy,
}

impl Writer {
    pub fn new(
        client: Arc<dyn TransportClient>,
        link: watch::Receiver<Link>,
        queue: mpsc::UnboundedReceiver<WriteRequest>,
        policy: ErrorPolicy,
    ) -> Self {
        Self {
            client,
            link,
            queue,
            policy,
        }
    }

    /// Drain the queue until the socket is dropped
    pub async fn run(mut self) {
        while let Some(request) = self.queue.recv().await {
            match request {
                WriteRequest::Barrier(done) => {
                    let _ = done.send(());
                }
                WriteRequest::Data {
                    bytes,
                    mut reply,
                    queued_at,
                } => {
                    // A caller that stops waiting before the connection exists
                    // takes its write out of the queue.
                    let waited = tokio::select! {
                        biased;
                        _ = reply.closed() => None,
                        handle = wait_for_handle(&mut self.link) => Some(handle),
                    };

                    let handle = match waited {
                        None => {
                            tracing::debug!(len = bytes.len(), "write abandoned before forwarding");
                            counters::write_completed(labels::RESULT_CANCELLED);
                            continue;
                        }
                        Some(Ok(handle)) => handle,
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "write dropped, connection unavailable");
                            counters::write_completed(labels::RESULT_ERROR);
                            let _ = reply.send(Err(e));
                            continue;
                        }
                    };

                    let outcome = forward(self.client.as_ref(), handle, bytes).await;
                    let outcome = self.apply_policy(handle, outcome);
                    histograms::write_duration(queued_at.elapsed().as_millis() as u64);
                    let _ = reply.send(outcome);
                }
            }
        }
        tracing::trace!("write queue closed");
    }

    fn apply_policy(&self, handle: ConnectionHandle, outcome: Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => {
                counters::write_completed(labels::RESULT_OK);
                Ok(())
            }
            Err(e) => {
                tracing::error!(handle = %handle, error = %e, "write failed");
                counters::write_completed(labels::RESULT_ERROR);
                match self.policy {
                    ErrorPolicy::Absorb => Ok(()),
                    ErrorPolicy::Propagate => Err(e),
                }
            }
        }
    }
}

/// Hand one write to the transport and wait for its completion callback
async fn forward(client: &dyn TransportClient, handle: ConnectionHandle, bytes: Bytes) -> Result<()> {
    let len = bytes.len();
    let (tx, rx) = oneshot::channel();
    client.write(
        handle,
        bytes,
        Box::new(move |status| {
            let _ = tx.send(status);
        }),
    );

    match rx.await {
        Ok(status) if !constants::is_error(status) => {
            counters::bytes_written(len);
            Ok(())
        }
        Ok(status) => Err(Error::WriteFailed(status)),
        Err(_) => Err(Error::Io(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "transport dropped the write completion callback",
        ))),
    }
}

/// Wait until the dial settles, then yield the handle or the reason there is none
async fn wait_for_handle(link: &mut watch::Receiver<Link>) -> Result<ConnectionHandle> {
    let snapshot = match link.wait_for(|link| link.state.is_settled()).await {
        Ok(settled) => Link::clone(&settled),
        Err(_) => return Err(Error::Cancelled),
    };
    snapshot.resolve()
}
