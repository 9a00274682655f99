//! Operator commands and their JSON-RPC mapping.
//!
//! # Commands
//!
//! | Input | Method |
//! |-------|--------|
//! | `auth <client_id> <secret> [-s]` | `public/auth` |
//! | `buy <instrument> <label> [amount] [price]` | `private/buy` |
//! | `sell <instrument> <label> [amount] [price]` | `private/sell` |
//! | `cancel <order_id>` | `private/cancel` |
//! | `modify <order_id> <amount> <price>` | `private/edit` |
//! | `orders` | `private/get_open_orders` |
//! | `orders <instrument>` | `private/get_open_orders_by_instrument` |
//! | `orders <currency>` | `private/get_open_orders_by_currency` |
//! | `positions [currency]` | `private/get_positions` |
//! | `book <instrument> [depth]` | `public/get_order_book` |
//! | `subscribe <index>` | `public/subscribe` |
//! | `unsubscribe <index>` | `public/unsubscribe` |
//!
//! Orders without a price are market orders; with a price they are limit
//! orders. Instruments are told apart from currencies by the `-` in
//! `BTC-PERPETUAL`.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value, json};

use crate::error::{Error, Result};

use super::request::RpcRequest;
use super::signature::{self, Credential};

// ============================================================================
// Constants
// ============================================================================

/// Channel prefix for price index subscriptions.
pub const PRICE_INDEX_PREFIX: &str = "deribit_price_index.";

/// Session name used by `auth ... -s`.
pub const DEFAULT_SESSION_NAME: &str = "terminal";

/// Order size used when `buy`/`sell` omit the amount.
pub const DEFAULT_AMOUNT: f64 = 10.0;

/// Currency used when `positions` omits it.
pub const DEFAULT_CURRENCY: &str = "BTC";

// ============================================================================
// Types
// ============================================================================

/// Side of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// `private/buy`.
    Buy,
    /// `private/sell`.
    Sell,
}

/// Parameters shared by `buy` and `sell`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderParams {
    /// Instrument name, e.g. `BTC-PERPETUAL`.
    pub instrument: String,
    /// Operator-chosen order label.
    pub label: String,
    /// Order size.
    pub amount: f64,
    /// Limit price; market order when `None`.
    pub price: Option<f64>,
}

/// Which open orders to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderFilter {
    /// Every open order.
    All,
    /// Orders on one instrument.
    Instrument(String),
    /// Orders in one currency.
    Currency(String),
}

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Authenticate with a signed `client_signature` grant.
    Auth {
        /// Key pair to sign with.
        credential: Credential,
        /// Session name for `session:<name>` scope.
        session: Option<String>,
    },
    /// Place a new order.
    Order {
        /// Buy or sell.
        side: Side,
        /// Order parameters.
        params: OrderParams,
    },
    /// Cancel an order.
    Cancel {
        /// Exchange order id.
        order_id: String,
    },
    /// Change amount and price of an order.
    Modify {
        /// Exchange order id.
        order_id: String,
        /// New amount.
        amount: f64,
        /// New price.
        price: f64,
    },
    /// List open orders.
    Orders(OrderFilter),
    /// List positions in a currency.
    Positions {
        /// Currency code.
        currency: String,
    },
    /// Fetch the order book.
    OrderBook {
        /// Instrument name.
        instrument: String,
        /// Number of levels, exchange default when `None`.
        depth: Option<u32>,
    },
    /// Subscribe to a price index.
    Subscribe {
        /// Index name, e.g. `btc_usd`.
        index: String,
    },
    /// Unsubscribe from a price index.
    Unsubscribe {
        /// Index name.
        index: String,
    },
}

// ============================================================================
// Parsing
// ============================================================================

impl Command {
    /// Parses one line of operator input.
    ///
    /// Returns `Ok(None)` for empty input and for verbs that are not protocol
    /// commands.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if a known verb has missing or malformed
    /// arguments.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match verb.to_ascii_lowercase().as_str() {
            "auth" => parse_auth(&args)?,
            "buy" => parse_order(Side::Buy, &args)?,
            "sell" => parse_order(Side::Sell, &args)?,
            "cancel" => {
                let [order_id] = args.as_slice() else {
                    return Err(usage("cancel <order_id>"));
                };
                Self::Cancel {
                    order_id: (*order_id).to_string(),
                }
            }
            "modify" => {
                let [order_id, amount, price] = args.as_slice() else {
                    return Err(usage("modify <order_id> <amount> <price>"));
                };
                Self::Modify {
                    order_id: (*order_id).to_string(),
                    amount: number(amount, "amount")?,
                    price: number(price, "price")?,
                }
            }
            "orders" => match args.as_slice() {
                [] => Self::Orders(OrderFilter::All),
                [target] if target.contains('-') => {
                    Self::Orders(OrderFilter::Instrument(target.to_ascii_uppercase()))
                }
                [target] => Self::Orders(OrderFilter::Currency(target.to_ascii_uppercase())),
                _ => return Err(usage("orders [instrument|currency]")),
            },
            "positions" => match args.as_slice() {
                [] => Self::Positions {
                    currency: DEFAULT_CURRENCY.to_string(),
                },
                [currency] => Self::Positions {
                    currency: currency.to_ascii_uppercase(),
                },
                _ => return Err(usage("positions [currency]")),
            },
            "book" => match args.as_slice() {
                [instrument] => Self::OrderBook {
                    instrument: instrument.to_ascii_uppercase(),
                    depth: None,
                },
                [instrument, depth] => Self::OrderBook {
                    instrument: instrument.to_ascii_uppercase(),
                    depth: Some(depth.parse::<u32>().map_err(|_| {
                        Error::invalid_argument(format!("depth '{depth}' is not a number"))
                    })?),
                },
                _ => return Err(usage("book <instrument> [depth]")),
            },
            "subscribe" => {
                let [index] = args.as_slice() else {
                    return Err(usage("subscribe <index>"));
                };
                Self::Subscribe {
                    index: index.to_ascii_lowercase(),
                }
            }
            "unsubscribe" => {
                let [index] = args.as_slice() else {
                    return Err(usage("unsubscribe <index>"));
                };
                Self::Unsubscribe {
                    index: index.to_ascii_lowercase(),
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(command))
    }
}

fn parse_auth(args: &[&str]) -> Result<Command> {
    let (session, rest): (Vec<&str>, Vec<&str>) =
        args.iter().copied().partition(|arg| *arg == "-s");
    let [client_id, client_secret] = rest.as_slice() else {
        return Err(usage("auth <client_id> <secret> [-s]"));
    };

    Ok(Command::Auth {
        credential: Credential::new(*client_id, *client_secret),
        session: (!session.is_empty()).then(|| DEFAULT_SESSION_NAME.to_string()),
    })
}

fn parse_order(side: Side, args: &[&str]) -> Result<Command> {
    let verb = match side {
        Side::Buy => "buy",
        Side::Sell => "sell",
    };

    let (instrument, label, amount, price) = match args {
        [instrument, label] => (instrument, label, None, None),
        [instrument, label, amount] => (instrument, label, Some(amount), None),
        [instrument, label, amount, price] => (instrument, label, Some(amount), Some(price)),
        _ => {
            return Err(usage(&format!(
                "{verb} <instrument> <label> [amount] [price]"
            )));
        }
    };

    Ok(Command::Order {
        side,
        params: OrderParams {
            instrument: instrument.to_ascii_uppercase(),
            label: (*label).to_string(),
            amount: amount
                .map(|a| number(a, "amount"))
                .transpose()?
                .unwrap_or(DEFAULT_AMOUNT),
            price: price.map(|p| number(p, "price")).transpose()?,
        },
    })
}

fn number(text: &str, field: &str) -> Result<f64> {
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(Error::invalid_argument(format!(
            "{field} must be a positive number, got '{text}'"
        ))),
    }
}

fn usage(form: &str) -> Error {
    Error::invalid_argument(format!("usage: {form}"))
}

// ============================================================================
// Request Mapping
// ============================================================================

impl Command {
    /// Returns the JSON-RPC method this command calls.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "public/auth",
            Self::Order {
                side: Side::Buy, ..
            } => "private/buy",
            Self::Order {
                side: Side::Sell,
                ..
            } => "private/sell",
            Self::Cancel { .. } => "private/cancel",
            Self::Modify { .. } => "private/edit",
            Self::Orders(OrderFilter::All) => "private/get_open_orders",
            Self::Orders(OrderFilter::Instrument(_)) => "private/get_open_orders_by_instrument",
            Self::Orders(OrderFilter::Currency(_)) => "private/get_open_orders_by_currency",
            Self::Positions { .. } => "private/get_positions",
            Self::OrderBook { .. } => "public/get_order_book",
            Self::Subscribe { .. } => "public/subscribe",
            Self::Unsubscribe { .. } => "public/unsubscribe",
        }
    }

    /// Returns the price index channel for subscribe and unsubscribe.
    #[must_use]
    pub fn channel(&self) -> Option<String> {
        match self {
            Self::Subscribe { index } | Self::Unsubscribe { index } => Some(channel_for(index)),
            _ => None,
        }
    }

    /// Builds the request, signing `auth` with the current time and a fresh
    /// nonce.
    #[must_use]
    pub fn to_request(&self) -> RpcRequest {
        if let Self::Auth {
            credential,
            session,
        } = self
        {
            return auth_request(
                credential,
                session.as_deref(),
                signature::timestamp_ms(),
                &signature::nonce(),
            );
        }
        RpcRequest::new(self.method(), self.params())
    }

    fn params(&self) -> Map<String, Value> {
        let value = match self {
            // Built by `auth_request`.
            Self::Auth { .. } => json!({}),
            Self::Order { params, .. } => {
                let order_type = if params.price.is_some() {
                    "limit"
                } else {
                    "market"
                };
                let mut value = json!({
                    "instrument_name": params.instrument,
                    "amount": params.amount,
                    "label": params.label,
                    "type": order_type,
                });
                if let Some(price) = params.price {
                    value["price"] = json!(price);
                }
                value
            }
            Self::Cancel { order_id } => json!({ "order_id": order_id }),
            Self::Modify {
                order_id,
                amount,
                price,
            } => json!({ "order_id": order_id, "amount": amount, "price": price }),
            Self::Orders(OrderFilter::All) => json!({}),
            Self::Orders(OrderFilter::Instrument(instrument)) => {
                json!({ "instrument_name": instrument })
            }
            Self::Orders(OrderFilter::Currency(currency)) | Self::Positions { currency } => {
                json!({ "currency": currency })
            }
            Self::OrderBook { instrument, depth } => {
                let mut value = json!({ "instrument_name": instrument });
                if let Some(depth) = depth {
                    value["depth"] = json!(depth);
                }
                value
            }
            Self::Subscribe { index } | Self::Unsubscribe { index } => {
                json!({ "channels": [channel_for(index)] })
            }
        };
        object(value)
    }
}

/// Builds a signed `public/auth` request.
#[must_use]
pub fn auth_request(
    credential: &Credential,
    session: Option<&str>,
    timestamp_ms: i64,
    nonce: &str,
) -> RpcRequest {
    let data = "";
    let mut value = json!({
        "grant_type": "client_signature",
        "client_id": credential.client_id(),
        "timestamp": timestamp_ms,
        "signature": credential.sign(timestamp_ms, nonce, data),
        "nonce": nonce,
        "data": data,
    });
    if let Some(name) = session {
        value["scope"] = json!(format!("session:{name}"));
    }
    RpcRequest::new("public/auth", object(value))
}

/// Returns the price index channel for `index`.
#[must_use]
pub fn channel_for(index: &str) -> String {
    format!("{PRICE_INDEX_PREFIX}{}", index.to_ascii_lowercase())
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================
