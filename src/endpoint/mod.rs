//! Connection multiplexer.
//!
//! This module owns the registry of connections and the blocking API the
//! terminal drives it with.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Endpoint`] | Registry, I/O thread, blocking operations |
//! | [`EndpointBuilder`] | Fluent configuration builder |
//! | [`EndpointOptions`] | Timeouts and intervals |
//!
//! # Example
//!
//! ```no_run
//! use deribit_terminal::{Endpoint, Result};
//!
//! # fn example() -> Result<()> {
//! let endpoint = Endpoint::builder().build()?;
//! let id = endpoint.connect("wss://test.deribit.com/ws/api/v2")?;
//!
//! endpoint.send(id, r#"{"jsonrpc":"2.0","id":7,"method":"public/get_time"}"#)?;
//! for message in endpoint.drain_messages(id) {
//!     println!("{message}");
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for endpoint configuration.
pub mod builder;

/// Registry and blocking operations.
pub mod core;

/// Routing of transport events to records.
mod dispatch;

/// Timeouts and intervals.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::EndpointBuilder;
pub use core::Endpoint;
pub use options::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_REPLY_TIMEOUT, DEFAULT_STREAM_INTERVAL, EndpointOptions,
    NORMAL_CLOSURE,
};
