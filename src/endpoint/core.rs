//! Connection registry and blocking caller API.
//!
//! The [`Endpoint`] owns every [`ConnectionRecord`], the drain buffer and the
//! single I/O thread that runs the transport for all connections.
//!
//! # Threads
//!
//! ```text
//!  caller threads                         I/O thread ("ws-io")
//! ┌──────────────┐  connect/send/close  ┌────────────────────────────┐
//! │   Endpoint   │─────────────────────►│ transport tasks (1 per id) │
//! │              │                      │            │ TransportEvent│
//! │ block until  │◄── watch / reply ────│        Dispatcher          │
//! │ open/timeout │                      └────────────────────────────┘
//! └──────────────┘
//! ```
//!
//! # Locking
//!
//! - Registry map and id counter: one `RwLock`.
//! - Record fields: the record's own lock, never the registry's.
//! - Drain buffer: its own lock.
//!
//! No lock is held while calling into the transport.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::runtime::{Builder as RuntimeBuilder, Handle, Runtime};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::transport::{
    ConnectionMetadata, ConnectionRecord, ConnectionStatus, EventSink, Link, MessageBuffer,
    Transport,
};

use super::builder::EndpointBuilder;
use super::dispatch::Dispatcher;
use super::options::EndpointOptions;

// ============================================================================
// Constants
// ============================================================================

/// Name of the I/O thread.
const IO_THREAD_NAME: &str = "ws-io";

/// How long teardown waits for transport tasks to stop.
const IO_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

// ============================================================================
// Registry
// ============================================================================

/// Id map and counter, mutated under one lock.
#[derive(Default)]
pub(crate) struct Registry {
    records: FxHashMap<ConnectionId, Arc<ConnectionRecord>>,
    next_id: u32,
}

impl Registry {
    /// Allocates the next id and stores a fresh `Connecting` record.
    pub(crate) fn register(&mut self, uri: &str, link: Link) -> Arc<ConnectionRecord> {
        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;

        let record = Arc::new(ConnectionRecord::new(id, uri, link));
        self.records.insert(id, Arc::clone(&record));
        record
    }

    #[inline]
    pub(crate) fn get(&self, id: ConnectionId) -> Option<Arc<ConnectionRecord>> {
        self.records.get(&id).cloned()
    }
}

// ============================================================================
// I/O Runtime
// ============================================================================

/// The running I/O thread and the sending half of its event channel.
struct IoRuntime {
    runtime: Runtime,
    events: EventSink,
}

/// What a caller needs to reach the I/O thread.
#[derive(Clone)]
struct IoContext {
    handle: Handle,
    events: EventSink,
}

impl IoRuntime {
    fn context(&self) -> IoContext {
        IoContext {
            handle: self.runtime.handle().clone(),
            events: self.events.clone(),
        }
    }
}

// ============================================================================
// EndpointInner
// ============================================================================

/// Shared state behind every [`Endpoint`] clone.
pub(crate) struct EndpointInner {
    options: EndpointOptions,
    transport: Arc<dyn Transport>,
    registry: Arc<RwLock<Registry>>,
    pub(crate) buffer: Arc<MessageBuffer>,
    io: Mutex<Option<IoRuntime>>,
}

impl Drop for EndpointInner {
    fn drop(&mut self) {
        if let Some(io) = self.io.get_mut().take() {
            io.runtime.shutdown_timeout(IO_SHUTDOWN_TIMEOUT);
            debug!("I/O thread stopped");
        }
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Registry of multiplexed WebSocket connections.
///
/// Connections are addressed by [`ConnectionId`]. Records are never removed,
/// so an id stays valid for [`Endpoint::metadata`] after the connection has
/// failed or closed.
///
/// # Blocking
///
/// `connect`, `wait_for_reply` and `request` block the calling thread. They
/// must not be called from inside an async runtime and return
/// [`Error::Config`] if they are.
///
/// # Example
///
/// ```no_run
/// use deribit_terminal::Endpoint;
///
/// # fn example() -> deribit_terminal::Result<()> {
/// let endpoint = Endpoint::builder().build()?;
/// let id = endpoint.connect("wss://test.deribit.com/ws/api/v2")?;
///
/// let reply = endpoint.request(id, r#"{"jsonrpc":"2.0","id":1,"method":"public/test"}"#)?;
/// println!("{reply}");
///
/// endpoint.close(id, 1000, "bye");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Endpoint {
    pub(crate) inner: Arc<EndpointInner>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("options", &self.inner.options)
            .field("connection_count", &self.connection_count())
            .field("io_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Endpoint - Constructor
// ============================================================================

impl Endpoint {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::new()
    }

    pub(crate) fn new(options: EndpointOptions, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(EndpointInner {
                options,
                transport,
                registry: Arc::new(RwLock::new(Registry::default())),
                buffer: Arc::new(MessageBuffer::new()),
                io: Mutex::new(None),
            }),
        }
    }
}

// ============================================================================
// Endpoint - Queries
// ============================================================================

impl Endpoint {
    /// Returns the configured options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &EndpointOptions {
        &self.inner.options
    }

    /// Returns the number of connections ever registered.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.registry.read().records.len()
    }

    /// Returns every registered id in ascending order.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.inner.registry.read().records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns `true` once the I/O thread has been started.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.io.lock().is_some()
    }

    /// Returns a snapshot of a connection.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownConnection`] if the id was never registered.
    pub fn metadata(&self, id: ConnectionId) -> Result<ConnectionMetadata> {
        Ok(self.record(id)?.metadata())
    }

    /// Removes and returns every message buffered for `id` since the last
    /// drain.
    ///
    /// Never blocks; unknown ids yield an empty vector. Does not affect
    /// synchronous waiters.
    #[must_use]
    pub fn drain_messages(&self, id: ConnectionId) -> Vec<String> {
        self.inner.buffer.drain(id)
    }
}

// ============================================================================
// Endpoint - Connection Lifecycle
// ============================================================================

impl Endpoint {
    /// Opens a connection and blocks until it is open, failed or timed out.
    ///
    /// Starts the I/O thread on first use. A timeout does not cancel the
    /// handshake; a late transition still updates the record.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] / [`Error::Url`] if `uri` is not a
    ///   `ws://` or `wss://` URI (no id is allocated)
    /// - [`Error::HandshakeFailed`] if the handshake failed
    /// - [`Error::ConnectionTimeout`] if the handshake did not finish in time
    pub fn connect(&self, uri: &str) -> Result<ConnectionId> {
        let url = Url::parse(uri)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::invalid_argument(format!(
                "unsupported scheme '{}', expected ws or wss",
                url.scheme()
            )));
        }

        ensure_blocking_allowed()?;
        let io = self.io()?;

        let (link, commands) = Link::channel();
        let record = self.inner.registry.write().register(uri, link);
        let id = record.id();
        let mut status_rx = record.subscribe_status();

        debug!(id = %id, uri = %uri, "Connecting");

        {
            let _guard = io.handle.enter();
            self.inner.transport.open(id, uri, commands, io.events.clone());
        }

        let wait = self.inner.options.connect_timeout;
        let outcome = io.handle.block_on(async {
            timeout(
                wait,
                status_rx.wait_for(|status| *status != ConnectionStatus::Connecting),
            )
            .await
            .map(|changed| changed.map(|status| *status))
        });

        match outcome {
            Ok(Ok(ConnectionStatus::Open)) => {
                info!(id = %id, uri = %uri, "Connection open");
                Ok(id)
            }
            Ok(Ok(status)) => {
                let reason = record
                    .error_reason()
                    .unwrap_or_else(|| status.to_string());
                warn!(id = %id, uri = %uri, reason = %reason, "Connection failed");

                if status == ConnectionStatus::Closed {
                    Err(Error::remote_closed(id, reason))
                } else {
                    Err(Error::handshake_failed(id, reason))
                }
            }
            Ok(Err(_)) => Err(Error::handshake_failed(id, "status channel closed")),
            Err(_) => {
                warn!(
                    id = %id,
                    uri = %uri,
                    timeout_ms = wait.as_millis() as u64,
                    "Connect timed out"
                );
                Err(Error::connection_timeout(id, wait.as_millis() as u64))
            }
        }
    }

    /// Requests a graceful close.
    ///
    /// No-op for unknown ids and terminal connections. The record becomes
    /// `Closed` when the transport reports the close.
    pub fn close(&self, id: ConnectionId, code: u16, reason: &str) {
        let Some(record) = self.inner.registry.read().get(id) else {
            debug!(id = %id, "Close on unknown connection ignored");
            return;
        };

        let Some(link) = record.closable_link() else {
            debug!(id = %id, "Close on terminal connection ignored");
            return;
        };

        if link.close(code, reason) {
            info!(id = %id, code, reason = %reason, "Close requested");
        }
    }

    /// Closes every connection that is not yet terminal.
    pub fn close_all(&self, reason: &str) {
        let code = self.inner.options.close_code;
        for id in self.connection_ids() {
            self.close(id, code, reason);
        }
    }
}

// ============================================================================
// Endpoint - Messaging
// ============================================================================

impl Endpoint {
    /// Sends one text frame. Does not wait for a reply.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownConnection`] if the id was never registered
    /// - [`Error::NotOpen`] if the connection is not `Open`
    pub fn send(&self, id: ConnectionId, message: &str) -> Result<()> {
        let record = self.record(id)?;
        let link = record.open_link()?;

        if !link.send_text(message) {
            return Err(Error::not_open(id, record.status()));
        }

        record.record_sent_message(message);
        debug!(id = %id, len = message.len(), "Message sent");
        Ok(())
    }

    /// Blocks until the next inbound message on `id` or until `wait` elapses.
    ///
    /// Only messages that arrive after the call starts count.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownConnection`] if the id was never registered
    /// - [`Error::NotOpen`] if the connection is not `Open`
    /// - [`Error::NoReply`] if nothing arrived in time
    pub fn wait_for_reply(&self, id: ConnectionId, wait: Duration) -> Result<String> {
        let record = self.record(id)?;
        let cursor = record.reply_cursor();
        self.await_reply(&record, cursor, wait, |_| true)
    }

    /// Sends `message` and returns its reply.
    ///
    /// If `message` is a JSON object with an `id`, the reply is the first
    /// inbound message carrying the same `id`; notifications and other
    /// replies arriving meanwhile are skipped. Otherwise it is the first
    /// message after the send. The pair is recorded in the connection's
    /// audit log.
    ///
    /// # Errors
    ///
    /// Same as [`Endpoint::send`] and [`Endpoint::wait_for_reply`].
    pub fn request(&self, id: ConnectionId, message: &str) -> Result<String> {
        let record = self.record(id)?;
        let expected = rpc_id(message);

        let cursor = record.reply_cursor();
        self.send(id, message)?;

        let wait = self.inner.options.reply_timeout;
        let reply = self.await_reply(&record, cursor, wait, |reply| {
            expected
                .as_ref()
                .is_none_or(|expected| rpc_id(reply).as_ref() == Some(expected))
        })?;

        record.record_summary(message, &reply);
        Ok(reply)
    }
}

// ============================================================================
// Endpoint - Internals
// ============================================================================

impl Endpoint {
    /// Waits for the first message after `cursor` that `accept` takes.
    fn await_reply(
        &self,
        record: &ConnectionRecord,
        mut cursor: u64,
        wait: Duration,
        accept: impl Fn(&str) -> bool,
    ) -> Result<String> {
        let id = record.id();
        let status = record.status();
        if status != ConnectionStatus::Open {
            return Err(Error::not_open(id, status));
        }

        ensure_blocking_allowed()?;
        let io = self.io()?;

        let outcome = io.handle.block_on(async {
            timeout(wait, async {
                loop {
                    let (seq, text) = record.next_reply_after(cursor).await?;
                    if accept(&text) {
                        return Some(text);
                    }
                    trace!(id = %id, seq, "Skipping unrelated message");
                    cursor = seq;
                }
            })
            .await
        });

        match outcome {
            Ok(Some(text)) => Ok(text),
            Ok(None) => Err(Error::not_open(id, record.status())),
            Err(_) => {
                debug!(id = %id, timeout_ms = wait.as_millis() as u64, "No reply");
                Err(Error::no_reply(id, wait.as_millis() as u64))
            }
        }
    }

    fn record(&self, id: ConnectionId) -> Result<Arc<ConnectionRecord>> {
        self.inner
            .registry
            .read()
            .get(id)
            .ok_or_else(|| Error::unknown_connection(id))
    }

    /// Returns the I/O context, starting the thread on first use.
    fn io(&self) -> Result<IoContext> {
        let mut io = self.inner.io.lock();
        if let Some(ref running) = *io {
            return Ok(running.context());
        }

        let runtime = RuntimeBuilder::new_multi_thread()
            .worker_threads(1)
            .thread_name(IO_THREAD_NAME)
            .enable_all()
            .build()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.inner.registry),
            Arc::clone(&self.inner.buffer),
        );
        runtime.spawn(dispatcher.run(events_rx));

        info!("I/O thread started");

        let running = IoRuntime {
            runtime,
            events: events_tx,
        };
        let context = running.context();
        *io = Some(running);
        Ok(context)
    }
}

/// Returns the JSON-RPC `id` of a frame, if it has a non-null one.
fn rpc_id(text: &str) -> Option<Value> {
    let mut value: Value = serde_json::from_str(text).ok()?;
    value
        .as_object_mut()?
        .remove("id")
        .filter(|id| !id.is_null())
}

/// Blocking waits would panic inside a runtime.
fn ensure_blocking_allowed() -> Result<()> {
    if Handle::try_current().is_ok() {
        return Err(Error::config(
            "blocking Endpoint call made from inside an async runtime",
        ));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
