//! Subscription notification types.
//!
//! Notifications are pushed by the exchange on every subscribed channel
//! without a request id.
//!
//! # Format
//!
//! ```json
//! {
//!   "jsonrpc": "2.0",
//!   "method": "subscription",
//!   "params": {
//!     "channel": "deribit_price_index.btc_usd",
//!     "data": { "timestamp": 1550588002899, "price": 3937.89, "index_name": "btc_usd" }
//!   }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use super::command::PRICE_INDEX_PREFIX;

// ============================================================================
// Constants
// ============================================================================

/// `method` value of every subscription notification.
pub const SUBSCRIPTION_METHOD: &str = "subscription";

// ============================================================================
// Notification
// ============================================================================

/// A raw subscription notification.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    /// Always `"subscription"`.
    pub method: String,

    /// Channel and payload.
    pub params: NotificationParams,
}

/// Channel and payload of a notification.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationParams {
    /// Channel name, e.g. `deribit_price_index.btc_usd`.
    pub channel: String,

    /// Channel-specific data.
    pub data: Value,
}

impl Notification {
    /// Parses an inbound frame.
    ///
    /// Returns `None` for anything that is not a subscription notification,
    /// including replies and malformed JSON.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str::<Self>(text)
            .ok()
            .filter(|n| n.method == SUBSCRIPTION_METHOD)
    }

    /// Interprets the payload by channel.
    #[must_use]
    pub fn into_parsed(self) -> ParsedNotification {
        let NotificationParams { channel, data } = self.params;

        if channel.starts_with(PRICE_INDEX_PREFIX)
            && let Ok(index) = serde_json::from_value::<PriceIndex>(data.clone())
        {
            return ParsedNotification::PriceIndex(index);
        }

        ParsedNotification::Other { channel, data }
    }
}

// ============================================================================
// ParsedNotification
// ============================================================================

/// Price index tick.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceIndex {
    /// Index name, e.g. `btc_usd`.
    pub index_name: String,

    /// Index value.
    pub price: f64,

    /// Exchange time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Typed view of a notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedNotification {
    /// `deribit_price_index.*` tick.
    PriceIndex(PriceIndex),

    /// Any other channel.
    Other {
        /// Channel name.
        channel: String,
        /// Raw payload.
        data: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_price_index_parsing() {
        let text = r#"{"jsonrpc":"2.0","method":"subscription","params":{"channel":"deribit_price_index.btc_usd","data":{"timestamp":1550588002899,"price":3937.89,"index_name":"btc_usd"}}}"#;

        let parsed = Notification::parse(text).expect("notification").into_parsed();
        assert_eq!(
            parsed,
            ParsedNotification::PriceIndex(PriceIndex {
                index_name: "btc_usd".into(),
                price: 3937.89,
                timestamp: 1_550_588_002_899,
            })
        );
    }

    #[test]
    fn test_other_channel() {
        let text = r#"{"method":"subscription","params":{"channel":"book.BTC-PERPETUAL.100ms","data":{"bids":[]}}}"#;

        let parsed = Notification::parse(text).expect("notification").into_parsed();
        assert_eq!(
            parsed,
            ParsedNotification::Other {
                channel: "book.BTC-PERPETUAL.100ms".into(),
                data: json!({ "bids": [] }),
            }
        );
    }

    #[test]
    fn test_malformed_price_index_falls_back() {
        let text = r#"{"method":"subscription","params":{"channel":"deribit_price_index.eth_usd","data":{"price":"n/a"}}}"#;

        let parsed = Notification::parse(text).expect("notification").into_parsed();
        assert!(matches!(parsed, ParsedNotification::Other { .. }));
    }

    #[test]
    fn test_replies_are_not_notifications() {
        assert!(Notification::parse(r#"{"jsonrpc":"2.0","id":1,"result":"ok"}"#).is_none());
        assert!(Notification::parse(r#"{"method":"heartbeat","params":{"channel":"x","data":1}}"#).is_none());
        assert!(Notification::parse("not json").is_none());
    }
}
