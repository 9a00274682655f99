//! Scripted in-process transport for tests.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::identifiers::ConnectionId;

use super::Transport;
use super::event::{EventSink, LinkCommand, LinkReceiver, TransportEvent};

// ============================================================================
// MockOutcome
// ============================================================================

/// What the mock does when a connection is opened.
#[derive(Debug, Clone)]
pub(crate) enum MockOutcome {
    /// Emit `Open` immediately.
    Open,
    /// Emit `Fail` with the reason immediately.
    Fail(String),
    /// Emit nothing; the record stays `Connecting`.
    Silent,
}

// ============================================================================
// MockTransport
// ============================================================================

/// Transport that opens or fails on script and records every command.
///
/// Unscripted connections open. A close command is answered with a close
/// event carrying the same code and reason.
#[derive(Default)]
pub(crate) struct MockTransport {
    script: Mutex<VecDeque<MockOutcome>>,
    sinks: Mutex<FxHashMap<ConnectionId, EventSink>>,
    sent: Arc<Mutex<Vec<(ConnectionId, LinkCommand)>>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues outcomes for the next `open` calls.
    pub(crate) fn script(&self, outcomes: impl IntoIterator<Item = MockOutcome>) {
        self.script.lock().extend(outcomes);
    }

    /// Injects an event as if it came from the network.
    pub(crate) fn emit(&self, event: TransportEvent) {
        if let Some(sink) = self.sinks.lock().get(&event.id()) {
            let _ = sink.send(event);
        }
    }

    /// Injects a text frame for `id`.
    pub(crate) fn push_message(&self, id: ConnectionId, text: &str) {
        self.emit(TransportEvent::Message {
            id,
            text: text.to_string(),
        });
    }

    /// Returns every command that reached the transport.
    pub(crate) fn sent(&self) -> Vec<(ConnectionId, LinkCommand)> {
        self.sent.lock().clone()
    }
}

impl Transport for MockTransport {
    fn open(&self, id: ConnectionId, _uri: &str, mut commands: LinkReceiver, events: EventSink) {
        let outcome = self.script.lock().pop_front().unwrap_or(MockOutcome::Open);
        self.sinks.lock().insert(id, events.clone());

        match outcome {
            MockOutcome::Open => {
                let _ = events.send(TransportEvent::Open {
                    id,
                    remote: "mock".into(),
                });
            }
            MockOutcome::Fail(reason) => {
                let _ = events.send(TransportEvent::Fail { id, reason });
            }
            MockOutcome::Silent => {}
        }

        let sent = Arc::clone(&self.sent);
        tokio::spawn(async move {
            while let Some(command) = commands.recv().await {
                sent.lock().push((id, command.clone()));

                if let LinkCommand::Close { code, reason } = command {
                    let _ = events.send(TransportEvent::Close {
                        id,
                        code: Some(code),
                        reason,
                    });
                }
            }
        });
    }
}
