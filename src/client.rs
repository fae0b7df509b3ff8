//! Client builder and call engine.
//!
//! The protocol carries no request identifiers, so a response can only be
//! matched to its request by never letting two exchanges overlap. Every call,
//! whether from a foreground caller or the background heartbeat, goes through
//! the same connection lock:
//!
//! ```text
//! Caller 1 ──┐
//! Caller 2 ──┼─► Mutex<FramedStream> ─► send request ─► recv response
//! Heartbeat ─┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use clusterwire::{Client, InMemoryServerStore, Message};
//!
//! let store = Arc::new(InMemoryServerStore::new());
//! let client = Client::builder()
//!     .heartbeat_interval(std::time::Duration::from_secs(5))
//!     .connect("127.0.0.1:9001", store)
//!     .await?;
//!
//! let mut request = Message::new(16);
//! let mut response = Message::new(512);
//! // ... encode request ...
//! client.call(None, &request, &mut response).await?;
//! client.close().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn, Instrument, Span};

use crate::config::ClientConfig;
use crate::error::{Result, ResultExt, WireError};
use crate::heartbeat;
use crate::protocol::Message;
use crate::store::ServerStore;
use crate::transport::{connect, Connection, FramedStream};

/// Builder for configuring and creating a client.
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new client builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the period between heartbeats. Zero disables the heartbeat.
    ///
    /// Default: 15 seconds
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Set the deadline of a single heartbeat call.
    ///
    /// Default: 1 second
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.config.heartbeat_timeout = timeout;
        self
    }

    /// Set how many consecutive zero-byte reads are tolerated.
    ///
    /// Default: 100
    pub fn max_empty_reads(mut self, limit: usize) -> Self {
        self.config.max_empty_reads = limit;
        self
    }

    /// Set the largest response body the client will accept.
    ///
    /// Default: 16 MB
    pub fn max_response_size(mut self, limit: usize) -> Self {
        self.config.max_response_size = limit;
        self
    }

    /// Build a client over an already connected stream.
    ///
    /// Must be called from within a Tokio runtime when heartbeats are enabled.
    pub fn build<S>(self, conn: S, address: &str, store: Arc<dyn ServerStore>) -> Result<Client<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        self.config.validate()?;
        Ok(Client::start(conn, address, store, self.config))
    }

    /// Dial `address` and build a client over the new connection.
    pub async fn connect(
        self,
        address: &str,
        store: Arc<dyn ServerStore>,
    ) -> Result<Client<Connection>> {
        self.config.validate()?;
        let conn = connect(address).await?;
        Ok(Client::start(conn, address, store, self.config))
    }
}

/// State shared by foreground callers and the heartbeat task.
pub(crate) struct Shared<S> {
    address: String,
    /// `None` once the client has been closed.
    conn: Mutex<Option<FramedStream<S>>>,
    closed: watch::Sender<bool>,
    max_response_size: usize,
}

impl<S> Shared<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub(crate) fn subscribe_closed(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Send `request` and receive into `response` while holding the connection lock.
    ///
    /// `deadline` bounds the wait for the lock only; once the exchange starts
    /// it runs to completion or failure.
    pub(crate) async fn call(
        &self,
        deadline: Option<Instant>,
        request: &Message,
        response: &mut Message,
    ) -> Result<()> {
        let mut closed = self.subscribe_closed();
        if *closed.borrow() {
            return Err(WireError::ConnectionClosed);
        }

        let mut guard = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.conn.lock())
                .await
                .map_err(|_| WireError::DeadlineExceeded)?,
            None => self.conn.lock().await,
        };
        let mut pending = PendingExchange {
            slot: &mut *guard,
            finished: false,
        };
        let conn = pending.slot.as_mut().ok_or(WireError::ConnectionClosed)?;

        let result = tokio::select! {
            biased;
            _ = wait_closed(&mut closed) => Err(WireError::ConnectionClosed),
            result = exchange(conn, request, response, self.max_response_size) => result,
        };
        pending.finished = true;
        result
    }
}

/// Connection slot held for the length of one exchange.
///
/// If the call future is dropped before the exchange finishes, the stream may
/// hold half a request or an unread response, so the connection is discarded
/// and every later call fails with [`WireError::ConnectionClosed`].
struct PendingExchange<'a, S> {
    slot: &'a mut Option<FramedStream<S>>,
    finished: bool,
}

impl<S> Drop for PendingExchange<'_, S> {
    fn drop(&mut self) {
        if !self.finished && self.slot.take().is_some() {
            warn!("call abandoned mid-exchange, dropping connection");
        }
    }
}

async fn exchange<S>(
    conn: &mut FramedStream<S>,
    request: &Message,
    response: &mut Message,
    max_response_size: usize,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    conn.send(request)
        .await
        .context("failed to send request")?;
    conn.recv(response, max_response_size)
        .await
        .context("failed to receive response")?;
    Ok(())
}

/// Resolve once the close flag is set.
pub(crate) async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    // An error means the sender is gone, which only happens on teardown.
    let _ = closed.wait_for(|closed| *closed).await;
}

/// A client connection to one server.
///
/// Dropping the client stops its heartbeat; call [`Client::close`] to also
/// shut the connection down cleanly.
pub struct Client<S> {
    shared: Arc<Shared<S>>,
    span: Span,
    heartbeat: Option<JoinHandle<()>>,
}

impl Client<Connection> {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Create a client with default configuration over a connected stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(conn: S, address: &str, store: Arc<dyn ServerStore>) -> Self {
        Self::start(conn, address, store, ClientConfig::default())
    }

    fn start(conn: S, address: &str, store: Arc<dyn ServerStore>, config: ClientConfig) -> Self {
        let (closed, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            address: address.to_string(),
            conn: Mutex::new(Some(FramedStream::new(conn, config.max_empty_reads))),
            closed,
            max_response_size: config.max_response_size,
        });
        let span = tracing::info_span!("client", address = %address);

        let heartbeat = if config.heartbeat_enabled() {
            debug!(parent: &span, interval = ?config.heartbeat_interval, "starting heartbeat");
            Some(tokio::spawn(
                heartbeat::run(shared.clone(), store, config).instrument(span.clone()),
            ))
        } else {
            None
        };

        Client {
            shared,
            span,
            heartbeat,
        }
    }

    /// Address of the connected server.
    pub fn address(&self) -> &str {
        &self.shared.address
    }

    /// Send `request` and read the matching reply into `response`.
    ///
    /// Calls are serialized: concurrent callers wait for the connection lock.
    /// `deadline`, when given, bounds that wait and never interrupts an
    /// exchange already on the wire.
    ///
    /// After a send or receive failure the connection may be mid-frame;
    /// close the client rather than reusing it. Dropping the returned future
    /// before it completes (for example under `tokio::time::timeout`)
    /// discards the connection, and later calls fail with
    /// [`WireError::ConnectionClosed`].
    pub async fn call(
        &self,
        deadline: Option<Instant>,
        request: &Message,
        response: &mut Message,
    ) -> Result<()> {
        let result = self
            .shared
            .call(deadline, request, response)
            .instrument(self.span.clone())
            .await;
        if let Err(e) = &result {
            debug!(parent: &self.span, error = %e, "call failed");
        }
        result
    }

    /// Stop the heartbeat and shut down the connection.
    ///
    /// A call in flight fails with [`WireError::ConnectionClosed`]; every later
    /// call fails the same way. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.shared.closed.send_replace(true) {
            return Ok(());
        }
        debug!(parent: &self.span, "closing connection");

        let conn = self.shared.conn.lock().await.take();
        match conn {
            Some(mut conn) => conn.shutdown().await,
            None => Ok(()),
        }
    }

    /// Whether [`Client::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Whether the background heartbeat task is still alive.
    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<S> Drop for Client<S> {
    fn drop(&mut self) {
        self.shared.closed.send_replace(true);
    }
}
