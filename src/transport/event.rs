//! Messages crossing the transport boundary.
//!
//! The transport reports lifecycle changes and inbound frames as
//! [`TransportEvent`]s on one channel shared by every connection. The
//! registry drives each connection through its [`Link`], the sending half of
//! a per-connection command channel.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;

use crate::identifiers::ConnectionId;

// ============================================================================
// Types
// ============================================================================

/// Sending half of the shared event channel.
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// Receiving half of a per-connection command channel.
pub type LinkReceiver = mpsc::UnboundedReceiver<LinkCommand>;

// ============================================================================
// TransportEvent
// ============================================================================

/// Lifecycle or message notification emitted by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Open {
        /// Connection the event belongs to.
        id: ConnectionId,
        /// Remote identity (the `Server` response header).
        remote: String,
    },

    /// Handshake or connection failed.
    Fail {
        /// Connection the event belongs to.
        id: ConnectionId,
        /// Failure reason.
        reason: String,
    },

    /// Connection closed.
    Close {
        /// Connection the event belongs to.
        id: ConnectionId,
        /// Close code, if a close frame was received.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },

    /// Text frame received.
    Message {
        /// Connection the event belongs to.
        id: ConnectionId,
        /// Raw frame payload.
        text: String,
    },
}

impl TransportEvent {
    /// Returns the connection this event belongs to.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        match self {
            Self::Open { id, .. }
            | Self::Fail { id, .. }
            | Self::Close { id, .. }
            | Self::Message { id, .. } => *id,
        }
    }
}

// ============================================================================
// LinkCommand
// ============================================================================

/// Instruction from the registry to one transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    /// Send a single text frame.
    Text(String),
    /// Start a graceful close.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

// ============================================================================
// Link
// ============================================================================

/// Opaque handle addressing one connection at the transport.
///
/// Sending never blocks. A failed send means the transport task has already
/// gone away.
#[derive(Debug, Clone)]
pub struct Link {
    tx: mpsc::UnboundedSender<LinkCommand>,
}

impl Link {
    /// Creates a link and the receiver the transport consumes.
    #[must_use]
    pub fn channel() -> (Self, LinkReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues a text frame. Returns `false` if the transport task is gone.
    #[inline]
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.tx.send(LinkCommand::Text(text.into())).is_ok()
    }

    /// Requests a graceful close. Returns `false` if the transport task is gone.
    #[inline]
    pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        self.tx
            .send(LinkCommand::Close {
                code,
                reason: reason.into(),
            })
            .is_ok()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id() {
        let event = TransportEvent::Message {
            id: ConnectionId::new(4),
            text: "{}".into(),
        };
        assert_eq!(event.id(), ConnectionId::new(4));
    }

    #[test]
    fn test_link_forwards_commands_in_order() {
        let (link, mut rx) = Link::channel();
        assert!(link.send_text("a"));
        assert!(link.close(1000, "bye"));

        assert_eq!(rx.try_recv().unwrap(), LinkCommand::Text("a".into()));
        assert_eq!(
            rx.try_recv().unwrap(),
            LinkCommand::Close {
                code: 1000,
                reason: "bye".into()
            }
        );
    }

    #[test]
    fn test_link_reports_dropped_receiver() {
        let (link, rx) = Link::channel();
        drop(rx);
        assert!(!link.send_text("x"));
    }
}
