//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing a connection handle with a JSON-RPC
//! request id at compile time.
//!
//! | Type | Source | Purpose |
//! |------|--------|---------|
//! | [`ConnectionId`] | Registry counter | Stable handle of one multiplexed connection |
//! | [`RequestId`] | Process-wide counter | JSON-RPC `id` field |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// Counters
// ============================================================================

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// ConnectionId
// ============================================================================

/// Handle of one logical connection in the registry.
///
/// Assigned by [`crate::Endpoint`] starting at 0, strictly increasing and
/// never reused for the lifetime of the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u32);

impl ConnectionId {
    /// Creates a connection id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ConnectionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// JSON-RPC request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Returns the next process-wide request id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a request id from a raw value.
    #[inline]
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display_and_parse() {
        let id = ConnectionId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(" 42 ".parse::<ConnectionId>().unwrap(), id);
        assert!("abc".parse::<ConnectionId>().is_err());
    }

    #[test]
    fn test_request_id_increments() {
        let a = RequestId::next();
        let b = RequestId::next();
        assert!(b > a);
    }

    #[test]
    fn test_request_id_serializes_as_number() {
        let json = serde_json::to_string(&RequestId::from_u64(9)).unwrap();
        assert_eq!(json, "9");
    }
}
