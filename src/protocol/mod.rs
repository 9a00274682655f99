//! Deribit JSON-RPC protocol.
//!
//! Builds the request strings the multiplexer sends and interprets what comes
//! back. The multiplexer itself treats every message as opaque text.
//!
//! # Message Types
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`RpcRequest`] | Client → Exchange | Method call |
//! | [`RpcResponse`] | Exchange → Client | Result or error |
//! | [`Notification`] | Exchange → Client | Subscription push |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Operator command parser and method mapping |
//! | `event` | Subscription notifications |
//! | `request` | Request and response types |
//! | `signature` | HMAC-SHA256 request signing |
//! | `subscription` | Active channel set |

// ============================================================================
// Submodules
// ============================================================================

/// Operator commands and their JSON-RPC mapping.
pub mod command;

/// Subscription notification types.
pub mod event;

/// Request and response message types.
pub mod request;

/// Request signing.
pub mod signature;

/// Active price index subscriptions.
pub mod subscription;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    Command, DEFAULT_SESSION_NAME, OrderFilter, OrderParams, PRICE_INDEX_PREFIX, Side,
    auth_request, channel_for,
};
pub use event::{Notification, NotificationParams, ParsedNotification, PriceIndex};
pub use request::{RpcError, RpcRequest, RpcResponse, pretty};
pub use signature::{Credential, signature};
pub use subscription::SubscriptionSet;
