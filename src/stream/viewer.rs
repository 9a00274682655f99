//! Live subscription viewer.
//!
//! Polls the drain buffer of every connection backing a subscription, renders
//! notifications for subscribed channels, and stops when the cancel signal
//! fires. Messages stored after the last drain stay in the buffer.

// ============================================================================
// Imports
// ============================================================================

use std::io::Write;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, trace};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::protocol::{Notification, ParsedNotification, PriceIndex, SubscriptionSet};

use super::cancel::CancelSignal;

// ============================================================================
// Constants
// ============================================================================

/// Line terminator; raw mode does not translate `\n`.
const LINE_END: &str = "\r\n";

// ============================================================================
// StreamStats
// ============================================================================

/// Counters reported when the viewer stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Completed poll iterations.
    pub iterations: u64,
    /// Lines written.
    pub rendered: u64,
    /// Drained messages that were not rendered.
    pub skipped: u64,
}

// ============================================================================
// StreamViewer
// ============================================================================

/// Polling loop over a [`SubscriptionSet`].
#[derive(Debug)]
pub struct StreamViewer<'a> {
    endpoint: &'a Endpoint,
    subscriptions: &'a SubscriptionSet,
    interval: Duration,
}

impl<'a> StreamViewer<'a> {
    /// Creates a viewer polling at the endpoint's `stream_interval`.
    #[must_use]
    pub fn new(endpoint: &'a Endpoint, subscriptions: &'a SubscriptionSet) -> Self {
        Self {
            endpoint,
            subscriptions,
            interval: endpoint.options().stream_interval,
        }
    }

    /// Overrides the polling interval.
    #[inline]
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs until `cancel` fires.
    ///
    /// The signal is checked before every drain, so nothing is consumed once
    /// it has fired.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if there are no subscriptions
    /// - [`Error::Io`] if writing to `out` fails
    pub fn run<C, W>(&self, cancel: &mut C, out: &mut W) -> Result<StreamStats>
    where
        C: CancelSignal + ?Sized,
        W: Write,
    {
        if self.subscriptions.is_empty() {
            return Err(Error::invalid_argument("no subscriptions to stream"));
        }

        debug!(
            channels = self.subscriptions.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Stream started"
        );

        let mut stats = StreamStats::default();
        while !cancel.is_cancelled() {
            self.poll_once(out, &mut stats)?;
            out.flush()?;
            stats.iterations += 1;
            thread::sleep(self.interval);
        }

        debug!(?stats, "Stream stopped");
        Ok(stats)
    }

    /// Drains every backing connection once and renders what matches.
    fn poll_once<W: Write>(&self, out: &mut W, stats: &mut StreamStats) -> Result<()> {
        for id in self.subscriptions.connections() {
            for text in self.endpoint.drain_messages(id) {
                match self.render(&text) {
                    Some(line) => {
                        out.write_all(line.as_bytes())?;
                        out.write_all(LINE_END.as_bytes())?;
                        stats.rendered += 1;
                    }
                    None => {
                        trace!(id = %id, "Skipped non-subscription message");
                        stats.skipped += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Renders one message if it is a notification on a subscribed channel.
    fn render(&self, text: &str) -> Option<String> {
        let notification = Notification::parse(text)?;
        let subscribed = self
            .subscriptions
            .iter()
            .any(|(channel, _)| channel == notification.params.channel);
        if !subscribed {
            return None;
        }
        Some(render_notification(notification.into_parsed()))
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Formats a notification as one terminal line.
#[must_use]
pub fn render_notification(notification: ParsedNotification) -> String {
    match notification {
        ParsedNotification::PriceIndex(PriceIndex {
            index_name,
            price,
            timestamp,
        }) => format!("[{}] {index_name} {price}", format_time(timestamp)),
        ParsedNotification::Other { channel, data } => format!("{channel} {data}"),
    }
}

/// Local wall-clock `HH:MM:SS` of a millisecond timestamp.
fn format_time(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|utc| utc.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Instant;

    use serde_json::json;

    use crate::identifiers::ConnectionId;
    use crate::transport::Transport;
    use crate::transport::mock::MockTransport;

    const URI: &str = "wss://valid.test/ws/api/v2";

    fn tick(index: &str, price: f64) -> String {
        json!({
            "jsonrpc": "2.0",
            "method": "subscription",
            "params": {
                "channel": format!("deribit_price_index.{index}"),
                "data": { "timestamp": 1_550_588_002_899_i64, "price": price, "index_name": index }
            }
        })
        .to_string()
    }

    fn setup() -> (Arc<MockTransport>, Endpoint, ConnectionId) {
        let mock = MockTransport::new();
        let endpoint = Endpoint::builder()
            .stream_interval(Duration::from_millis(5))
            .transport(Arc::clone(&mock) as Arc<dyn Transport>)
            .build()
            .expect("build");
        let id = endpoint.connect(URI).expect("connect");
        (mock, endpoint, id)
    }

    fn wait_pending(endpoint: &Endpoint, id: ConnectionId, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while endpoint.inner.buffer.pending(id) < count {
            assert!(Instant::now() < deadline, "messages never arrived");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_renders_subscribed_price_index() {
        let (mock, endpoint, id) = setup();
        let mut subscriptions = SubscriptionSet::new();
        subscriptions.insert("deribit_price_index.btc_usd", id);

        mock.push_message(id, &tick("btc_usd", 3937.89));
        mock.push_message(id, &tick("eth_usd", 140.5));
        mock.push_message(
            id,
            r#"{"jsonrpc":"2.0","id":9,"result":["deribit_price_index.btc_usd"]}"#,
        );
        wait_pending(&endpoint, id, 3);

        let mut polls = 0;
        let mut cancel = || {
            polls += 1;
            polls > 1
        };
        let mut out = Vec::<u8>::new();

        let stats = StreamViewer::new(&endpoint, &subscriptions)
            .run(&mut cancel, &mut out)
            .expect("run");

        let text = String::from_utf8(out).unwrap();
        assert_eq!(stats.iterations, 1);
        assert_eq!(stats.rendered, 1);
        assert_eq!(stats.skipped, 2);
        assert!(text.contains("btc_usd 3937.89\r\n"));
        assert!(!text.contains("eth_usd"));
    }

    #[test]
    fn test_cancel_before_first_drain_keeps_messages() {
        let (mock, endpoint, id) = setup();
        let mut subscriptions = SubscriptionSet::new();
        subscriptions.insert("deribit_price_index.btc_usd", id);

        mock.push_message(id, &tick("btc_usd", 1.0));
        wait_pending(&endpoint, id, 1);

        let mut out = Vec::<u8>::new();
        let stats = StreamViewer::new(&endpoint, &subscriptions)
            .run(&mut || true, &mut out)
            .unwrap();

        assert_eq!(stats, StreamStats::default());
        assert!(out.is_empty());
        assert_eq!(endpoint.drain_messages(id).len(), 1);
    }

    #[test]
    fn test_messages_after_cancel_remain_for_next_drain() {
        let (mock, endpoint, id) = setup();
        let mut subscriptions = SubscriptionSet::new();
        subscriptions.insert("deribit_price_index.btc_usd", id);

        mock.push_message(id, &tick("btc_usd", 1.0));
        wait_pending(&endpoint, id, 1);

        let mut polls = 0;
        let mut cancel = || {
            polls += 1;
            polls > 2
        };
        let mut out = Vec::<u8>::new();
        StreamViewer::new(&endpoint, &subscriptions)
            .run(&mut cancel, &mut out)
            .unwrap();

        mock.push_message(id, &tick("btc_usd", 2.0));
        wait_pending(&endpoint, id, 1);

        let remaining = endpoint.drain_messages(id);
        assert_eq!(remaining, vec![tick("btc_usd", 2.0)]);
        assert_eq!(
            endpoint.metadata(id).unwrap().status,
            crate::transport::ConnectionStatus::Open
        );
    }

    #[test]
    fn test_empty_subscriptions_rejected() {
        let (_mock, endpoint, _id) = setup();
        let subscriptions = SubscriptionSet::new();

        let err = StreamViewer::new(&endpoint, &subscriptions)
            .run(&mut || false, &mut Vec::<u8>::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_render_other_channel_as_compact_json() {
        let line = render_notification(ParsedNotification::Other {
            channel: "book.BTC-PERPETUAL.100ms".into(),
            data: json!({ "bids": [[1.0, 2.0]] }),
        });
        assert_eq!(line, r#"book.BTC-PERPETUAL.100ms {"bids":[[1.0,2.0]]}"#);
    }

    #[test]
    fn test_render_price_index_time_shape() {
        let line = render_notification(ParsedNotification::PriceIndex(PriceIndex {
            index_name: "btc_usd".into(),
            price: 42.5,
            timestamp: 0,
        }));

        // "[HH:MM:SS] btc_usd 42.5"
        assert_eq!(line.len(), "[00:00:00] btc_usd 42.5".len());
        assert!(line.starts_with('['));
        assert_eq!(&line[9..], "] btc_usd 42.5");
    }
}
