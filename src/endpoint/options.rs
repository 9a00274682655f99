//! Endpoint timing options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use deribit_terminal::EndpointOptions;
//!
//! let options = EndpointOptions::new()
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_stream_interval(Duration::from_millis(250));
//!
//! assert_eq!(options.connect_timeout, Duration::from_secs(5));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default bound on `connect` waiting for the handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on a synchronous reply wait.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default stream viewer polling interval.
pub const DEFAULT_STREAM_INTERVAL: Duration = Duration::from_millis(300);

/// WebSocket normal closure.
pub const NORMAL_CLOSURE: u16 = 1000;

// ============================================================================
// EndpointOptions
// ============================================================================

/// Timeouts and intervals used by an [`crate::Endpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointOptions {
    /// How long `connect` blocks for the handshake.
    pub connect_timeout: Duration,

    /// How long `request` and `wait_for_reply` block for a message.
    pub reply_timeout: Duration,

    /// Pause between stream viewer iterations.
    pub stream_interval: Duration,

    /// Close code used by `close_all`.
    pub close_code: u16,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors & Builder Methods
// ============================================================================

impl EndpointOptions {
    /// Creates options with default values.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            stream_interval: DEFAULT_STREAM_INTERVAL,
            close_code: NORMAL_CLOSURE,
        }
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the reply timeout.
    #[inline]
    #[must_use]
    pub const fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Sets the stream polling interval.
    #[inline]
    #[must_use]
    pub const fn with_stream_interval(mut self, interval: Duration) -> Self {
        self.stream_interval = interval;
        self
    }

    /// Sets the close code used when closing all connections.
    #[inline]
    #[must_use]
    pub const fn with_close_code(mut self, code: u16) -> Self {
        self.close_code = code;
        self
    }

    /// Checks that every duration is non-zero and the close code is one an
    /// endpoint may send.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be greater than zero"));
        }
        if self.reply_timeout.is_zero() {
            return Err(Error::config("reply_timeout must be greater than zero"));
        }
        if self.stream_interval.is_zero() {
            return Err(Error::config("stream_interval must be greater than zero"));
        }
        // 1000 and the 3000-4999 application range are valid to send.
        if !(self.close_code == NORMAL_CLOSURE || (3000..5000).contains(&self.close_code)) {
            return Err(Error::config(format!(
                "close_code {} cannot be sent by an endpoint",
                self.close_code
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
