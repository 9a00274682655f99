//! Builder pattern for endpoint configuration.
//!
//! Provides a fluent API for configuring and creating [`Endpoint`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use deribit_terminal::Endpoint;
//!
//! # fn example() -> deribit_terminal::Result<()> {
//! let endpoint = Endpoint::builder()
//!     .connect_timeout(Duration::from_secs(5))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::transport::{Transport, WsTransport};

use super::core::Endpoint;
use super::options::EndpointOptions;

// ============================================================================
// EndpointBuilder
// ============================================================================

/// Builder for configuring an [`Endpoint`] instance.
///
/// Use [`Endpoint::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct EndpointBuilder {
    /// Timeouts and intervals.
    options: EndpointOptions,
    /// Custom transport; defaults to [`WsTransport`].
    transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for EndpointBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointBuilder")
            .field("options", &self.options)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

// ============================================================================
// EndpointBuilder Implementation
// ============================================================================

impl EndpointBuilder {
    /// Creates a new builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: EndpointOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets how long `connect` waits for the handshake.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets how long a synchronous reply wait blocks.
    #[inline]
    #[must_use]
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.options.reply_timeout = timeout;
        self
    }

    /// Sets the stream viewer polling interval.
    #[inline]
    #[must_use]
    pub fn stream_interval(mut self, interval: Duration) -> Self {
        self.options.stream_interval = interval;
        self
    }

    /// Uses a custom transport instead of the WebSocket one.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the endpoint with validation.
    ///
    /// The I/O thread is not started until the first `connect`.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Config`] if any option is invalid.
    pub fn build(self) -> Result<Endpoint> {
        self.options.validate()?;

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(WsTransport::new()));

        Ok(Endpoint::new(self.options, transport))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::mock::MockTransport;

    #[test]
    fn test_new_uses_default_options() {
        let builder = EndpointBuilder::new();
        assert_eq!(builder.options, EndpointOptions::default());
        assert!(builder.transport.is_none());
    }

    #[test]
    fn test_setters_update_options() {
        let builder = EndpointBuilder::new()
            .connect_timeout(Duration::from_millis(100))
            .reply_timeout(Duration::from_millis(200))
            .stream_interval(Duration::from_millis(50));

        assert_eq!(builder.options.connect_timeout, Duration::from_millis(100));
        assert_eq!(builder.options.reply_timeout, Duration::from_millis(200));
        assert_eq!(builder.options.stream_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_build_rejects_zero_timeout() {
        let result = EndpointBuilder::new()
            .connect_timeout(Duration::ZERO)
            .transport(MockTransport::new())
            .build();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("connect_timeout"));
    }

    #[test]
    fn test_build_with_custom_transport() {
        let endpoint = EndpointBuilder::new()
            .transport(MockTransport::new())
            .build()
            .expect("build");
        assert_eq!(endpoint.connection_count(), 0);
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = EndpointBuilder::new().reply_timeout(Duration::from_secs(1));
        let cloned = builder.clone();
        assert_eq!(builder.options, cloned.options);
    }
}
