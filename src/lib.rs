//! Deribit terminal - multiplexed JSON-RPC over secure WebSocket.
//!
//! This library keeps several independent, long-lived TLS WebSocket
//! connections to the exchange behind stable numeric handles, and hands
//! inbound data from one background I/O thread to any number of foreground
//! consumers.
//!
//! # Architecture
//!
//! - **Endpoint**: registry of connections, blocking `connect`/`request` API
//! - **I/O thread**: one tokio worker runs every connection and the event
//!   dispatcher
//! - **Two sinks per message**: the record's reply window (request/response
//!   callers) and the drain buffer (stream viewer)
//!
//! Key design principles:
//!
//! - Connections never share state; one failing does not affect another
//! - Records are never removed, so ids stay valid for inspection
//! - No lock is held across a call into the transport
//!
//! # Quick Start
//!
//! ```no_run
//! use deribit_terminal::{Command, Endpoint, Result};
//!
//! fn main() -> Result<()> {
//!     let endpoint = Endpoint::builder().build()?;
//!     let id = endpoint.connect("wss://test.deribit.com/ws/api/v2")?;
//!
//!     if let Some(command) = Command::parse("book BTC-PERPETUAL 5")? {
//!         let reply = endpoint.request(id, &command.to_request().to_json()?)?;
//!         println!("{reply}");
//!     }
//!
//!     endpoint.close_all("done");
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`endpoint`] | Registry, options, blocking operations |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Connection and request ids |
//! | [`protocol`] | Commands, JSON-RPC messages, signing |
//! | [`stream`] | Live subscription viewer |
//! | [`transport`] | WebSocket transport, records, drain buffer |

// ============================================================================
// Modules
// ============================================================================

/// Connection registry and blocking API.
///
/// Use [`Endpoint::builder()`] to create a configured endpoint.
pub mod endpoint;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Deribit JSON-RPC protocol.
pub mod protocol;

/// Live subscription streaming.
pub mod stream;

/// WebSocket transport layer.
///
/// Per-connection records, transport events and the drain buffer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Endpoint types
pub use endpoint::{Endpoint, EndpointBuilder, EndpointOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, RequestId};

// Protocol types
pub use protocol::{Command, Credential, RpcRequest, RpcResponse, SubscriptionSet};

// Stream types
pub use stream::{CancelSignal, KeyCancel, StreamStats, StreamViewer};

// Transport types
pub use transport::{ConnectionMetadata, ConnectionStatus, Transport, WsTransport};
