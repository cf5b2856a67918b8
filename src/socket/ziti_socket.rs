//! Duplex socket over a callback-driven transport

use super::chunk::{Chunk, Encoding};
use super::config::{ErrorPolicy, SocketConfig};
use super::inbound::{self, InboundFlow};
use super::state::{DialFailure, Link, SocketState};
use super::writer::{WriteRequest, Writer};
use crate::metrics::{counters, histograms, labels};
use crate::transport::{ConnectionHandle, OnConnect, TransportClient};
use crate::{Error, Result};
use bytes::Bytes;
use futures::future::BoxFuture;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::Instrument;

/// State shared with the transport's connect callback and the dial watchdog
struct Shared {
    link: watch::Sender<Link>,
    flow: Arc<InboundFlow>,
    policy: ErrorPolicy,
}

impl Shared {
    fn transition(&self, next: SocketState, update: impl FnOnce(&mut Link)) -> Result<()> {
        let mut outcome = Ok(());
        self.link.send_if_modified(|link| match link.state.transition(next) {
            Ok(()) => {
                update(link);
                true
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }

    fn on_dial_complete(
        &self,
        service: &str,
        result: std::result::Result<ConnectionHandle, i32>,
        started: Instant,
    ) {
        match result {
            Ok(handle) => {
                match self.transition(SocketState::Connected, |link| link.handle = Some(handle)) {
                    Ok(()) => {
                        self.flow.attach(handle);
                        tracing::debug!(service, handle = %handle, "connected");
                        counters::dial_completed(service, labels::RESULT_OK);
                        histograms::dial_duration(service, started.elapsed().as_millis() as u64);
                    }
                    Err(_) => {
                        let state = self.link.borrow().state;
                        tracing::debug!(service, handle = %handle, %state, "ignoring connect callback for settled socket");
                    }
                }
            }
            Err(code) => {
                tracing::error!(service, code, "dial failed");
                counters::dial_completed(service, labels::RESULT_ERROR);
                if self.policy == ErrorPolicy::Propagate {
                    let _ = self.transition(SocketState::Failed, |link| {
                        link.failure = Some(DialFailure::Refused(code))
                    });
                }
            }
        }
    }
}

/// Completion of a queued write
///
/// Resolves once the transport has signalled completion of the write.
/// Dropping it before the connection exists withdraws the write.
#[must_use = "a write is withdrawn if its completion is dropped before the connection exists"]
pub struct WriteCompletion {
    inner: BoxFuture<'static, Result<()>>,
}

impl WriteCompletion {
    fn ready() -> Self {
        Self {
            inner: Box::pin(futures::future::ready(Ok(()))),
        }
    }

    fn pending(reply: oneshot::Receiver<Result<()>>, timeout: Option<Duration>) -> Self {
        let inner = async move {
            let reply = match timeout {
                Some(limit) => match tokio::time::timeout(limit, reply).await {
                    Ok(reply) => reply,
                    Err(_) => {
                        tracing::debug!(timeout_ms = limit.as_millis() as u64, "write timed out");
                        counters::write_completed(labels::RESULT_TIMEOUT);
                        return Err(Error::Timeout("write"));
                    }
                },
                None => reply.await,
            };
            reply.map_err(|_| Error::Cancelled)?
        };
        Self {
            inner: Box::pin(inner),
        }
    }
}

impl Future for WriteCompletion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for WriteCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WriteCompletion")
    }
}

/// Duplex byte stream over one overlay connection
///
/// The socket is usable before it is connected: writes issued while the dial
/// is in flight wait for the connection and are forwarded in order once it
/// exists. Inbound data pushed by the transport is read through
/// [`AsyncRead`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
/// use ziti_wire::socket::ZitiSocket;
/// use ziti_wire::transport::{MemoryTransport, ServiceBehavior};
///
/// # #[tokio::main]
/// # async fn main() -> std::io::Result<()> {
/// let transport = Arc::new(MemoryTransport::new().with_service("echo", ServiceBehavior::Echo));
/// let mut socket = ZitiSocket::new(transport);
///
/// socket.connect("echo");
/// socket.write_all(b"hello").await?;
///
/// let mut buf = [0u8; 5];
/// socket.read_exact(&mut buf).await?;
/// assert_eq!(&buf, b"hello");
/// # Ok(())
/// # }
/// ```
pub struct ZitiSocket {
    client: Arc<dyn TransportClient>,
    config: SocketConfig,
    shared: Arc<Shared>,
    writes: mpsc::UnboundedSender<WriteRequest>,
    inbound_tx: Option<mpsc::UnboundedSender<Bytes>>,
    inbound: mpsc::UnboundedReceiver<Bytes>,
    flow: Arc<InboundFlow>,
    read_pending: Bytes,
    in_flight: Option<WriteCompletion>,
    shutdown: Option<oneshot::Receiver<()>>,
    ended: bool,
}

impl ZitiSocket {
    /// Create an unconnected socket with the default configuration
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(client: Arc<dyn TransportClient>) -> Self {
        Self::with_config(client, SocketConfig::default())
    }

    /// Create an unconnected socket
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_config(client: Arc<dyn TransportClient>, config: SocketConfig) -> Self {
        let (link, link_rx) = watch::channel(Link::new());
        let (writes, queue) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        tokio::spawn(Writer::new(Arc::clone(&client), link_rx, queue, config.error_policy).run());

        let flow = Arc::new(InboundFlow::new(
            config.read_low_watermark,
            config.read_high_watermark,
            Arc::downgrade(&client),
        ));

        Self {
            shared: Arc::new(Shared {
                link,
                flow: Arc::clone(&flow),
                policy: config.error_policy,
            }),
            flow,
            client,
            config,
            writes,
            inbound_tx: Some(inbound_tx),
            inbound,
            read_pending: Bytes::new(),
            in_flight: None,
            shutdown: None,
            ended: false,
        }
    }

    /// Start connecting to `service` and return immediately
    ///
    /// The dial runs in the background. Only the first call dials; later calls
    /// reuse the pending or established connection. Use
    /// [`connected`](Self::connected) to wait for the outcome.
    pub fn connect(&mut self, service: impl Into<String>) -> &mut Self {
        let service = service.into();
        self.start_dial(&service);
        self
    }

    /// Connect to `service` and wait for the connection handle
    ///
    /// Resolves immediately if the socket is already connected.
    pub async fn dial(&mut self, service: impl Into<String>) -> Result<ConnectionHandle> {
        let service = service.into();
        let span = tracing::debug_span!("ziti_dial", service = %service);
        self.start_dial(&service);
        self.connected().instrument(span).await
    }

    /// Wait until the dial settles
    ///
    /// Resolves with the connection handle once connected. Fails if the dial
    /// failed under [`ErrorPolicy::Propagate`], timed out, or the socket was
    /// closed. Under [`ErrorPolicy::Absorb`] a failed dial never resolves.
    ///
    /// The returned future does not borrow the socket.
    pub fn connected(&self) -> impl Future<Output = Result<ConnectionHandle>> + Send + 'static {
        let mut link = self.shared.link.subscribe();
        async move {
            let snapshot = match link.wait_for(|link| link.state.is_settled()).await {
                Ok(settled) => Link::clone(&settled),
                Err(_) => return Err(Error::Cancelled),
            };
            snapshot.resolve()
        }
    }

    /// Queue a write
    ///
    /// Text that cannot be represented in `encoding` and writes after
    /// [`end`](Self::end) fail here, before the transport is involved. Empty
    /// payloads complete immediately without reaching the transport.
    pub fn write_chunk(&self, chunk: impl Into<Chunk>, encoding: Encoding) -> Result<WriteCompletion> {
        let bytes = chunk.into().into_bytes(encoding)?;
        if self.ended {
            return Err(Error::WriteAfterEnd);
        }
        if bytes.is_empty() {
            return Ok(WriteCompletion::ready());
        }

        let (reply, rx) = oneshot::channel();
        self.writes
            .send(WriteRequest::Data {
                bytes,
                reply,
                queued_at: Instant::now(),
            })
            .map_err(|_| Error::Cancelled)?;
        Ok(WriteCompletion::pending(rx, self.config.write_timeout))
    }

    /// Finish the writable side
    ///
    /// Waits until every earlier write has been handled. The transport
    /// connection stays open.
    pub async fn end(&mut self) -> Result<()> {
        self.ended = true;
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.await?;
        }

        let (done, rx) = oneshot::channel();
        if self.writes.send(WriteRequest::Barrier(done)).is_ok() {
            let _ = rx.await;
        }
        tracing::debug!("writable side finished");
        Ok(())
    }

    /// Close the socket locally
    ///
    /// Pending and queued writes fail with [`Error::Cancelled`]. No close is
    /// sent to the transport.
    pub fn close(&mut self) {
        if self.shared.transition(SocketState::Closed, |_| {}).is_ok() {
            tracing::debug!("socket closed");
        }
    }

    /// Accepted for socket compatibility; has no effect
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        tracing::trace!(?timeout, "set_timeout ignored");
        self
    }

    /// Accepted for socket compatibility; has no effect
    pub fn set_no_delay(&mut self, no_delay: bool) -> &mut Self {
        tracing::trace!(no_delay, "set_no_delay ignored");
        self
    }

    /// Accepted for socket compatibility; has no effect
    pub fn set_keep_alive(&mut self, enable: bool, initial_delay: Option<Duration>) -> &mut Self {
        tracing::trace!(enable, ?initial_delay, "set_keep_alive ignored");
        self
    }

    /// Peer identity is verified by the overlay
    pub fn authorized(&self) -> bool {
        true
    }

    /// Traffic is encrypted by the overlay
    pub fn encrypted(&self) -> bool {
        true
    }

    /// No ALPN negotiation takes place
    pub fn alpn_protocol(&self) -> Option<&'static str> {
        None
    }

    /// Current state
    pub fn state(&self) -> SocketState {
        self.shared.link.borrow().state
    }

    /// Connection handle, once connected
    pub fn handle(&self) -> Option<ConnectionHandle> {
        self.shared.link.borrow().handle
    }

    /// Service passed to the first `connect`
    pub fn service(&self) -> Option<String> {
        self.shared.link.borrow().service.clone()
    }

    /// Inbound bytes received but not yet read
    pub fn buffered_inbound(&self) -> usize {
        self.flow.buffered()
    }

    /// Whether the transport has been asked to pause inbound delivery
    pub fn is_read_paused(&self) -> bool {
        self.flow.is_paused()
    }

    /// Configuration in effect
    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    fn start_dial(&mut self, service: &str) {
        let dialing = self.shared.transition(SocketState::Dialing, |link| {
            link.service = Some(service.to_string())
        });
        if dialing.is_err() {
            match self.state() {
                SocketState::Closed => tracing::debug!(service, "socket closed, not dialing"),
                state => {
                    tracing::debug!(service, %state, "dial already issued, reusing connection")
                }
            }
            return;
        }
        let Some(inbound_tx) = self.inbound_tx.take() else {
            return;
        };

        let _span = tracing::debug_span!("dial_request", service).entered();
        tracing::debug!("dialing service");
        counters::dial_attempted(service);

        let started = Instant::now();
        let shared = Arc::clone(&self.shared);
        let dialed = service.to_string();
        let on_connect: OnConnect =
            Box::new(move |result| shared.on_dial_complete(&dialed, result, started));
        let on_data = inbound::data_callback(inbound_tx, Arc::clone(&self.flow));

        self.client.dial(service, false, on_connect, on_data);

        if let Some(limit) = self.config.dial_timeout {
            if self.state() == SocketState::Dialing {
                self.spawn_dial_watchdog(service.to_string(), limit);
            }
        }
    }

    fn spawn_dial_watchdog(&self, service: String, limit: Duration) {
        let shared = Arc::clone(&self.shared);
        let mut link = self.shared.link.subscribe();
        tokio::spawn(async move {
            let settled = tokio::time::timeout(limit, async {
                link.wait_for(|link| link.state != SocketState::Dialing)
                    .await
                    .is_ok()
            })
            .await;

            if settled.is_err() {
                let timed_out = shared.transition(SocketState::Failed, |link| {
                    link.failure = Some(DialFailure::TimedOut)
                });
                if timed_out.is_ok() {
                    tracing::warn!(service = %service, timeout_ms = limit.as_millis() as u64, "dial timed out");
                    counters::dial_completed(&service, labels::RESULT_TIMEOUT);
                }
            }
        });
    }

    /// Wait for the write queued by the previous `poll_write`
    fn poll_in_flight(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let result = ready!(Pin::new(in_flight).poll(cx));
        self.in_flight = None;
        Poll::Ready(result.map_err(io::Error::from))
    }
}

impl Drop for ZitiSocket {
    fn drop(&mut self) {
        let _ = self.shared.transition(SocketState::Closed, |_| {});
    }
}

impl std::fmt::Debug for ZitiSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let link = self.shared.link.borrow();
        f.debug_struct("ZitiSocket")
            .field("state", &link.state)
            .field("service", &link.service)
            .field("handle", &link.handle)
            .field("ended", &self.ended)
            .finish()
    }
}

impl AsyncRead for ZitiSocket {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        while this.read_pending.is_empty() {
            match ready!(this.inbound.poll_recv(cx)) {
                Some(bytes) => this.read_pending = bytes,
                // transport dropped the data callback
                None => return Poll::Ready(Ok(())),
            }
        }

        let n = buf.remaining().min(this.read_pending.len());
        buf.put_slice(&this.read_pending.split_to(n));
        this.flow.consumed(n);
        Poll::Ready(Ok(()))
    }
}

/// Each `poll_write` queues its buffer and reports it written at once. The
/// next write, `poll_flush` and `poll_shutdown` first wait for that write to
/// complete, so at most one write per socket is outstanding through this
/// interface and its failure surfaces on the following call.
impl AsyncWrite for ZitiSocket {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_in_flight(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let completion = this.write_chunk(Bytes::copy_from_slice(buf), Encoding::Utf8)?;
        this.in_flight = Some(completion);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().poll_in_flight(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_in_flight(cx))?;
        this.ended = true;

        if this.shutdown.is_none() {
            let (done, rx) = oneshot::channel();
            if this.writes.send(WriteRequest::Barrier(done)).is_err() {
                return Poll::Ready(Ok(()));
            }
            this.shutdown = Some(rx);
        }
        if let Some(barrier) = this.shutdown.as_mut() {
            // a dropped barrier means the writer is gone; nothing is left to wait for
            let _ = ready!(Pin::new(barrier).poll(cx));
        }
        this.shutdown = None;
        tracing::debug!("writable side finished");
        Poll::Ready(Ok(()))
    }
}
