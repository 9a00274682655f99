//! Drain-style message store for streaming consumers.
//!
//! Every inbound text frame is appended here in addition to the
//! per-connection reply queue. Consumers remove everything buffered for a
//! connection in one call, so the stream viewer never blocks and never
//! competes with a synchronous waiter for the same message.

// ============================================================================
// Imports
// ============================================================================

use std::mem;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::identifiers::ConnectionId;

// ============================================================================
// MessageBuffer
// ============================================================================

/// Per-connection FIFO of raw text messages awaiting a drain.
///
/// One lock guards the whole map. Message volume is interactive scale, so
/// contention stays low.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    messages: Mutex<FxHashMap<ConnectionId, Vec<String>>>,
}

impl MessageBuffer {
    /// Creates an empty buffer.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message for `id`.
    pub fn store(&self, id: ConnectionId, text: String) {
        self.messages.lock().entry(id).or_default().push(text);
    }

    /// Removes and returns every message buffered for `id`, oldest first.
    ///
    /// Unknown ids yield an empty vector.
    #[must_use]
    pub fn drain(&self, id: ConnectionId) -> Vec<String> {
        self.messages
            .lock()
            .get_mut(&id)
            .map(mem::take)
            .unwrap_or_default()
    }

    /// Returns the number of messages buffered for `id`.
    #[inline]
    #[must_use]
    pub fn pending(&self, id: ConnectionId) -> usize {
        self.messages.lock().get(&id).map_or(0, Vec::len)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_drain_returns_in_order() {
        let buffer = MessageBuffer::new();
        let id = ConnectionId::new(0);
        buffer.store(id, "a".into());
        buffer.store(id, "b".into());

        assert_eq!(buffer.drain(id), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_second_drain_is_empty() {
        let buffer = MessageBuffer::new();
        let id = ConnectionId::new(0);
        buffer.store(id, r#"{"id":1}"#.into());

        assert_eq!(buffer.drain(id).len(), 1);
        assert!(buffer.drain(id).is_empty());
        assert_eq!(buffer.pending(id), 0);
    }

    #[test]
    fn test_unknown_id_is_empty() {
        let buffer = MessageBuffer::new();
        assert!(buffer.drain(ConnectionId::new(99)).is_empty());
    }

    #[test]
    fn test_connections_are_isolated() {
        let buffer = MessageBuffer::new();
        let a = ConnectionId::new(0);
        let b = ConnectionId::new(1);
        buffer.store(a, "for-a".into());

        assert!(buffer.drain(b).is_empty());
        assert_eq!(buffer.drain(a), vec!["for-a".to_string()]);
    }

    #[test]
    fn test_concurrent_store_and_drain_loses_nothing() {
        let buffer = Arc::new(MessageBuffer::new());
        let id = ConnectionId::new(0);

        let writer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for i in 0..1000 {
                    buffer.store(id, i.to_string());
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < 1000 {
            seen.extend(buffer.drain(id));
            thread::yield_now();
        }
        writer.join().unwrap();

        let expected: Vec<String> = (0..1000).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);
    }
}
