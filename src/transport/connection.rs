//! Per-connection record and synchronous reply wait.
//!
//! A [`ConnectionRecord`] holds the lifecycle status of one multiplexed
//! connection, its audit log, the [`Link`] used to address it at the
//! transport, and a bounded window of recent inbound messages read by
//! synchronous waiters.
//!
//! # Status Transitions
//!
//! ```text
//! Connecting ──► Open ──► Closed
//!     │            │
//!     └──► Failed ◄┘
//! ```
//!
//! Only the lifecycle handlers (`on_open`, `on_fail`, `on_close`) change the
//! status. Every change is published on a `watch` channel after the record's
//! own lock has been updated, so a woken waiter always sees the final state.
//!
//! # Reply Window
//!
//! Every inbound message gets a sequence number (its position in
//! `messages_received`). A waiter takes the current count as its cursor and
//! waits for the first message numbered above it, so it only ever sees
//! messages that arrived after it started. Only the newest
//! [`REPLY_WINDOW`] messages are kept.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::event::Link;

// ============================================================================
// Constants
// ============================================================================

/// Maximum length of a reply summary stored in the audit log.
const SUMMARY_MAX_CHARS: usize = 160;

/// Number of recent inbound messages kept for synchronous waiters.
pub const REPLY_WINDOW: usize = 64;

/// Remote label shown when the server sent no `Server` header.
pub const UNKNOWN_REMOTE: &str = "None Specified";

// ============================================================================
// ConnectionStatus
// ============================================================================

/// Lifecycle status of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Handshake in progress.
    Connecting,
    /// Handshake completed, frames may be sent.
    Open,
    /// Handshake or connection failed.
    Failed,
    /// Closed gracefully by either side.
    Closed,
}

impl ConnectionStatus {
    /// Returns `true` for `Failed` and `Closed`.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    /// Returns `true` if `self -> next` is one of the allowed transitions.
    #[inline]
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Open)
                | (Self::Connecting, Self::Failed)
                | (Self::Open, Self::Closed)
                | (Self::Open, Self::Failed)
        )
    }

    /// Returns the display name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "Connecting",
            Self::Open => "Open",
            Self::Failed => "Failed",
            Self::Closed => "Closed",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// AuditEntry
// ============================================================================

/// One outbound request and, once known, a summary of its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Frame sent to the server.
    pub request: String,
    /// Truncated reply, if one was awaited.
    pub response: Option<String>,
}

// ============================================================================
// ConnectionMetadata
// ============================================================================

/// Read-only snapshot of a connection record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMetadata {
    /// Connection id.
    pub id: ConnectionId,
    /// Status at snapshot time.
    pub status: ConnectionStatus,
    /// Target URI.
    pub uri: String,
    /// Remote identity, once open.
    pub remote: Option<String>,
    /// Failure or close reason.
    pub error_reason: Option<String>,
    /// Number of inbound messages seen so far.
    pub messages_received: u64,
    /// Audit log, oldest first.
    pub audit: Vec<AuditEntry>,
}

impl fmt::Display for ConnectionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "> Connection: {}", self.id)?;
        writeln!(f, "> URI: {}", self.uri)?;
        writeln!(f, "> Status: {}", self.status)?;
        writeln!(
            f,
            "> Remote Server: {}",
            self.remote.as_deref().unwrap_or(UNKNOWN_REMOTE)
        )?;
        writeln!(
            f,
            "> Error/close reason: {}",
            self.error_reason.as_deref().unwrap_or("N/A")
        )?;
        writeln!(f, "> Messages Received: {}", self.messages_received)?;
        writeln!(f, "> Messages Sent: {}", self.audit.len())?;

        for entry in &self.audit {
            writeln!(f, "  >> {}", entry.request)?;
            if let Some(ref response) = entry.response {
                writeln!(f, "  << {response}")?;
            }
        }

        Ok(())
    }
}

// ============================================================================
// ConnectionRecord
// ============================================================================

/// Mutable fields guarded by the record's own lock.
struct RecordState {
    status: ConnectionStatus,
    remote: Option<String>,
    error_reason: Option<String>,
    messages_received: u64,
    audit: Vec<AuditEntry>,
    link: Option<Link>,
    recent: VecDeque<(u64, String)>,
}

/// State of one logical connection.
///
/// Records are never removed from the registry; after reaching a terminal
/// status they remain available for inspection.
pub struct ConnectionRecord {
    id: ConnectionId,
    uri: String,
    state: Mutex<RecordState>,
    status_tx: watch::Sender<ConnectionStatus>,
    received_tx: watch::Sender<u64>,
}

impl fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionRecord - Constructor & Accessors
// ============================================================================

impl ConnectionRecord {
    /// Creates a record in `Connecting`.
    #[must_use]
    pub fn new(id: ConnectionId, uri: impl Into<String>, link: Link) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Connecting);
        let (received_tx, _) = watch::channel(0);

        Self {
            id,
            uri: uri.into(),
            state: Mutex::new(RecordState {
                status: ConnectionStatus::Connecting,
                remote: None,
                error_reason: None,
                messages_received: 0,
                audit: Vec::new(),
                link: Some(link),
                recent: VecDeque::with_capacity(REPLY_WINDOW),
            }),
            status_tx,
            received_tx,
        }
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the target URI.
    #[inline]
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns the current status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.state.lock().status
    }

    /// Subscribes to status changes.
    ///
    /// The receiver starts at the current status, so a transition that
    /// happened before subscribing is still observed.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Returns the recorded failure or close reason.
    #[must_use]
    pub fn error_reason(&self) -> Option<String> {
        self.state.lock().error_reason.clone()
    }

    /// Takes a snapshot for display.
    #[must_use]
    pub fn metadata(&self) -> ConnectionMetadata {
        let state = self.state.lock();
        ConnectionMetadata {
            id: self.id,
            status: state.status,
            uri: self.uri.clone(),
            remote: state.remote.clone(),
            error_reason: state.error_reason.clone(),
            messages_received: state.messages_received,
            audit: state.audit.clone(),
        }
    }
}

// ============================================================================
// ConnectionRecord - Lifecycle Handlers
// ============================================================================

impl ConnectionRecord {
    /// Handles a completed handshake.
    pub fn on_open(&self, remote: impl Into<String>) -> bool {
        self.transition(ConnectionStatus::Open, Some(remote.into()), None)
    }

    /// Handles a handshake or connection failure.
    pub fn on_fail(&self, reason: impl Into<String>) -> bool {
        self.transition(ConnectionStatus::Failed, None, Some(reason.into()))
    }

    /// Handles a close.
    ///
    /// A close that arrives before the handshake completed is recorded as a
    /// failure.
    pub fn on_close(&self, code: Option<u16>, reason: &str) -> bool {
        let reason = match code {
            Some(code) => format!("close code: {code}, close reason: {reason}"),
            None => reason.to_string(),
        };

        let next = if self.status() == ConnectionStatus::Connecting {
            ConnectionStatus::Failed
        } else {
            ConnectionStatus::Closed
        };

        self.transition(next, None, Some(reason))
    }

    /// Numbers an inbound message and wakes synchronous waiters.
    ///
    /// The oldest message is evicted once the window is full.
    pub fn on_message(&self, text: String) {
        let seq = {
            let mut state = self.state.lock();
            state.messages_received += 1;
            let seq = state.messages_received;

            if state.recent.len() == REPLY_WINDOW {
                state.recent.pop_front();
            }
            state.recent.push_back((seq, text));
            seq
        };

        self.received_tx.send_replace(seq);
        trace!(id = %self.id, seq, "Message received");
    }

    fn transition(
        &self,
        next: ConnectionStatus,
        remote: Option<String>,
        reason: Option<String>,
    ) -> bool {
        let mut state = self.state.lock();

        if !state.status.can_transition_to(next) {
            debug!(
                id = %self.id,
                from = %state.status,
                to = %next,
                "Ignoring status transition"
            );
            return false;
        }

        state.status = next;
        if remote.is_some() {
            state.remote = remote;
        }
        if reason.is_some() {
            state.error_reason = reason;
        }
        if next.is_terminal() {
            state.link = None;
        }

        self.status_tx.send_replace(next);
        debug!(id = %self.id, status = %next, "Status changed");
        true
    }
}

// ============================================================================
// ConnectionRecord - Outbound
// ============================================================================

impl ConnectionRecord {
    /// Returns the link if the connection is open.
    ///
    /// # Errors
    ///
    /// [`Error::NotOpen`] if the status is anything but `Open`.
    pub fn open_link(&self) -> Result<Link> {
        let state = self.state.lock();
        match (&state.link, state.status) {
            (Some(link), ConnectionStatus::Open) => Ok(link.clone()),
            (_, status) => Err(Error::not_open(self.id, status)),
        }
    }

    /// Returns the link unless the connection is already terminal.
    #[must_use]
    pub fn closable_link(&self) -> Option<Link> {
        let state = self.state.lock();
        if state.status.is_terminal() {
            None
        } else {
            state.link.clone()
        }
    }

    /// Appends an outbound frame to the audit log.
    pub fn record_sent_message(&self, text: impl Into<String>) {
        self.state.lock().audit.push(AuditEntry {
            request: text.into(),
            response: None,
        });
    }

    /// Attaches a reply summary to the most recent matching request.
    pub fn record_summary(&self, sent: &str, reply: &str) {
        let summary = summarize(reply);
        let mut state = self.state.lock();

        let entry = state
            .audit
            .iter_mut()
            .rev()
            .find(|entry| entry.request == sent && entry.response.is_none());

        match entry {
            Some(entry) => entry.response = Some(summary),
            None => state.audit.push(AuditEntry {
                request: sent.to_string(),
                response: Some(summary),
            }),
        }
    }
}

// ============================================================================
// ConnectionRecord - Synchronous Wait
// ============================================================================

impl ConnectionRecord {
    /// Returns the sequence number of the newest inbound message.
    ///
    /// Pass it to [`ConnectionRecord::next_reply_after`] to wait for messages
    /// that arrive from now on.
    #[inline]
    #[must_use]
    pub fn reply_cursor(&self) -> u64 {
        self.state.lock().messages_received
    }

    /// Waits for the first message numbered above `after`.
    ///
    /// Returns the message with its sequence number, or `None` once the
    /// connection is terminal with nothing newer in the window. If the
    /// window moved past `after`, the oldest retained message is returned.
    /// Any number of waiters may wait at once; each sees every message.
    /// Callers bound the wait with a timeout.
    pub async fn next_reply_after(&self, after: u64) -> Option<(u64, String)> {
        let mut received = self.received_tx.subscribe();
        let mut status = self.status_tx.subscribe();

        loop {
            {
                let state = self.state.lock();
                if let Some((seq, text)) = state.recent.iter().find(|(seq, _)| *seq > after) {
                    return Some((*seq, text.clone()));
                }
                if state.status.is_terminal() {
                    return None;
                }
            }

            // Both senders live as long as the record.
            tokio::select! {
                changed = received.changed() => changed.ok()?,
                changed = status.changed() => changed.ok()?,
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Truncates a reply for the audit log.
fn summarize(reply: &str) -> String {
    if reply.chars().count() <= SUMMARY_MAX_CHARS {
        return reply.to_string();
    }

    let mut summary: String = reply.chars().take(SUMMARY_MAX_CHARS).collect();
    summary.push_str("...");
    summary
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use proptest::prelude::*;
    use tokio::time::timeout;

    use crate::transport::event::LinkReceiver;

    fn record() -> (ConnectionRecord, LinkReceiver) {
        let (link, rx) = Link::channel();
        let record = ConnectionRecord::new(ConnectionId::new(0), "wss://example.test/ws", link);
        (record, rx)
    }

    #[test]
    fn test_allowed_transitions() {
        use ConnectionStatus::*;

        assert!(Connecting.can_transition_to(Open));
        assert!(Connecting.can_transition_to(Failed));
        assert!(Open.can_transition_to(Closed));
        assert!(Open.can_transition_to(Failed));

        assert!(!Open.can_transition_to(Connecting));
        assert!(!Failed.can_transition_to(Connecting));
        assert!(!Closed.can_transition_to(Open));
        assert!(!Failed.can_transition_to(Closed));
        assert!(!Connecting.can_transition_to(Closed));
    }

    #[test]
    fn test_open_then_close() {
        let (record, _rx) = record();
        assert!(record.on_open("nginx"));
        assert!(record.on_close(Some(1000), "bye"));

        let meta = record.metadata();
        assert_eq!(meta.status, ConnectionStatus::Closed);
        assert_eq!(meta.remote.as_deref(), Some("nginx"));
        assert_eq!(
            meta.error_reason.as_deref(),
            Some("close code: 1000, close reason: bye")
        );
    }

    #[test]
    fn test_close_while_connecting_is_failure() {
        let (record, _rx) = record();
        assert!(record.on_close(None, "reset"));
        assert_eq!(record.status(), ConnectionStatus::Failed);
        assert_eq!(record.error_reason().as_deref(), Some("reset"));
    }

    #[test]
    fn test_terminal_status_is_sticky() {
        let (record, _rx) = record();
        assert!(record.on_fail("handshake error"));
        assert!(!record.on_open("late"));
        assert!(!record.on_close(Some(1000), "late"));

        let meta = record.metadata();
        assert_eq!(meta.status, ConnectionStatus::Failed);
        assert_eq!(meta.error_reason.as_deref(), Some("handshake error"));
        assert_eq!(meta.remote, None);
    }

    #[test]
    fn test_open_link_requires_open() {
        let (record, _rx) = record();
        let err = record.open_link().unwrap_err();
        assert!(matches!(
            err,
            Error::NotOpen {
                status: ConnectionStatus::Connecting,
                ..
            }
        ));

        record.on_open("x");
        assert!(record.open_link().is_ok());

        record.on_close(Some(1000), "done");
        assert!(record.open_link().is_err());
        assert!(record.closable_link().is_none());
    }

    #[test]
    fn test_status_watch_sees_prior_transition() {
        let (record, _rx) = record();
        record.on_open("x");
        let rx = record.subscribe_status();
        assert_eq!(*rx.borrow(), ConnectionStatus::Open);
    }

    #[test]
    fn test_audit_summary_pairs_with_request() {
        let (record, _rx) = record();
        record.record_sent_message("req-1");
        record.record_sent_message("req-2");
        record.record_summary("req-1", "reply-1");

        let audit = record.metadata().audit;
        assert_eq!(audit.len(), 2);
        assert_eq!(audit[0].response.as_deref(), Some("reply-1"));
        assert_eq!(audit[1].response, None);
    }

    #[test]
    fn test_summarize_truncates() {
        let long = "x".repeat(SUMMARY_MAX_CHARS + 10);
        let summary = summarize(&long);
        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS + 3);
        assert_eq!(summarize("short"), "short");
    }

    #[tokio::test]
    async fn test_next_reply_after_cursor_in_order() {
        let (record, _rx) = record();
        record.on_open("x");
        record.on_message("a".into());
        record.on_message("b".into());

        assert_eq!(record.next_reply_after(0).await, Some((1, "a".to_string())));
        assert_eq!(record.next_reply_after(1).await, Some((2, "b".to_string())));
        assert_eq!(record.reply_cursor(), 2);
        assert_eq!(record.metadata().messages_received, 2);
    }

    #[tokio::test]
    async fn test_earlier_messages_are_not_replies() {
        let (record, _rx) = record();
        record.on_open("x");
        record.on_message("old".into());

        let cursor = record.reply_cursor();
        let result = timeout(Duration::from_millis(20), record.next_reply_after(cursor)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_waiter_woken_by_new_message() {
        let (record, _rx) = record();
        record.on_open("x");
        let record = std::sync::Arc::new(record);

        let waiter = {
            let record = std::sync::Arc::clone(&record);
            tokio::spawn(async move { record.next_reply_after(0).await })
        };
        tokio::task::yield_now().await;
        record.on_message("fresh".into());

        let reply = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter finished")
            .expect("waiter task");
        assert_eq!(reply, Some((1, "fresh".to_string())));
    }

    #[tokio::test]
    async fn test_waiter_released_on_close() {
        let (record, _rx) = record();
        record.on_open("x");
        record.on_close(Some(1000), "bye");
        assert_eq!(record.next_reply_after(0).await, None);
    }

    #[tokio::test]
    async fn test_reply_window_is_bounded() {
        let (record, _rx) = record();
        record.on_open("x");
        for i in 0..(REPLY_WINDOW as u64 * 4) {
            record.on_message(format!("tick-{i}"));
        }

        assert_eq!(record.state.lock().recent.len(), REPLY_WINDOW);
        let oldest = REPLY_WINDOW as u64 * 3 + 1;
        assert_eq!(
            record.next_reply_after(0).await,
            Some((oldest, format!("tick-{}", oldest - 1)))
        );
    }

    // ========================================================================
    // Property Tests
    // ========================================================================

    #[derive(Debug, Clone, Copy)]
    enum Lifecycle {
        Open,
        Fail,
        Close,
    }

    fn lifecycle() -> impl Strategy<Value = Lifecycle> {
        prop_oneof![
            Just(Lifecycle::Open),
            Just(Lifecycle::Fail),
            Just(Lifecycle::Close),
        ]
    }

    proptest! {
        #[test]
        fn prop_status_path_is_monotonic(events in proptest::collection::vec(lifecycle(), 0..12)) {
            let (record, _rx) = record();
            let mut path = vec![record.status()];

            for event in events {
                let changed = match event {
                    Lifecycle::Open => record.on_open("x"),
                    Lifecycle::Fail => record.on_fail("err"),
                    Lifecycle::Close => record.on_close(Some(1000), "bye"),
                };
                let status = record.status();
                prop_assert_eq!(changed, status != *path.last().unwrap());
                if changed {
                    path.push(status);
                }
            }

            use ConnectionStatus::*;
            let allowed: [&[ConnectionStatus]; 5] = [
                &[Connecting],
                &[Connecting, Open],
                &[Connecting, Failed],
                &[Connecting, Open, Closed],
                &[Connecting, Open, Failed],
            ];
            prop_assert!(allowed.contains(&path.as_slice()), "path {:?}", path);
            prop_assert_eq!(record.closable_link().is_none(), record.status().is_terminal());
        }
    }
}
