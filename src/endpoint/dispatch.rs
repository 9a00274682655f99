//! Single event-processing routine of the endpoint.
//!
//! The transport pushes every [`TransportEvent`] onto one channel. The
//! [`Dispatcher`] runs on the I/O thread, resolves the target record under
//! the registry's read lock, releases it, and applies the event under the
//! record's own lock. Inbound text is fed to two sinks: the drain buffer and
//! the record's reply window, in that order.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::transport::{MessageBuffer, TransportEvent};

use super::core::Registry;

// ============================================================================
// Dispatcher
// ============================================================================

/// Applies transport events to connection records.
pub(crate) struct Dispatcher {
    registry: Arc<RwLock<Registry>>,
    buffer: Arc<MessageBuffer>,
}

impl Dispatcher {
    pub(crate) fn new(registry: Arc<RwLock<Registry>>, buffer: Arc<MessageBuffer>) -> Self {
        Self { registry, buffer }
    }

    /// Consumes events until every sender is gone.
    pub(crate) async fn run(self, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        debug!("Event dispatcher started");

        while let Some(event) = events.recv().await {
            self.dispatch(event);
        }

        debug!("Event dispatcher terminated");
    }

    /// Applies one event.
    ///
    /// Errors never escape: an event for an unknown id is logged and dropped,
    /// an illegal transition is ignored by the record.
    pub(crate) fn dispatch(&self, event: TransportEvent) {
        let id = event.id();
        let Some(record) = self.registry.read().get(id) else {
            warn!(id = %id, "Event for unknown connection");
            return;
        };

        match event {
            TransportEvent::Open { remote, .. } => {
                record.on_open(remote);
            }

            TransportEvent::Fail { reason, .. } => {
                warn!(id = %id, reason = %reason, "Connection failed");
                record.on_fail(reason);
            }

            TransportEvent::Close { code, reason, .. } => {
                debug!(id = %id, ?code, reason = %reason, "Connection closed");
                record.on_close(code, &reason);
            }

            TransportEvent::Message { text, .. } => {
                self.buffer.store(id, text.clone());
                record.on_message(text);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
