//! WebSocket transport layer.
//!
//! This module handles the per-connection side of the multiplexer: the
//! transport capability, the events it emits, the record kept for each
//! connection and the drain buffer used by streaming consumers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  LinkCommand  ┌────────────────┐    TLS/WS    ┌──────────┐
//! │   Endpoint   │──────────────►│ Transport task │◄────────────►│ Exchange │
//! │  (registry)  │◄──────────────│  (I/O thread)  │              └──────────┘
//! └──────────────┘ TransportEvent└────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `buffer` | Drain-style message store |
//! | `connection` | Connection record, status, metadata |
//! | `event` | Transport events, link commands |
//! | `websocket` | tokio-tungstenite transport |

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::ConnectionId;

// ============================================================================
// Submodules
// ============================================================================

/// Drain-style message store.
pub mod buffer;

/// Connection record and synchronous reply wait.
pub mod connection;

/// Messages crossing the transport boundary.
pub mod event;

/// tokio-tungstenite transport.
pub mod websocket;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use buffer::MessageBuffer;
pub use connection::{
    AuditEntry, ConnectionMetadata, ConnectionRecord, ConnectionStatus, REPLY_WINDOW,
};
pub use event::{EventSink, Link, LinkCommand, LinkReceiver, TransportEvent};
pub use websocket::WsTransport;

// ============================================================================
// Transport
// ============================================================================

/// Capability to open connections and report their lifecycle.
///
/// `open` is called from inside the endpoint's I/O runtime, so
/// implementations may `tokio::spawn` their per-connection work. It must not
/// block. Every outcome, including handshake failure, is reported as a
/// [`TransportEvent`] on `events`; the connection is driven through
/// `commands` until the channel closes.
pub trait Transport: Send + Sync + 'static {
    /// Starts connecting to `uri` on behalf of connection `id`.
    fn open(&self, id: ConnectionId, uri: &str, commands: LinkReceiver, events: EventSink);
}
