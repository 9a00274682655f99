//! TLS WebSocket transport built on tokio-tungstenite.
//!
//! Each connection runs as one task on the endpoint's I/O runtime. The task
//! performs the handshake, then multiplexes inbound frames and outbound
//! [`LinkCommand`]s with `tokio::select!` until either side closes.
//!
//! # Event Mapping
//!
//! | Transport condition | Event |
//! |---------------------|-------|
//! | Handshake completed | [`TransportEvent::Open`] |
//! | Handshake error, read/write error | [`TransportEvent::Fail`] |
//! | Close frame, end of stream | [`TransportEvent::Close`] |
//! | Text frame | [`TransportEvent::Message`] |

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::http::header::SERVER;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, trace, warn};

use crate::identifiers::ConnectionId;

use super::connection::UNKNOWN_REMOTE;
use super::event::{EventSink, LinkCommand, LinkReceiver, TransportEvent};
use super::Transport;

// ============================================================================
// WsTransport
// ============================================================================

/// WebSocket transport supporting `ws://` and `wss://` (rustls, ring).
#[derive(Debug, Clone, Copy)]
pub struct WsTransport;

impl WsTransport {
    /// Creates the transport and installs the process-wide TLS crypto
    /// provider if none is installed yet.
    #[must_use]
    pub fn new() -> Self {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            trace!("TLS crypto provider already installed");
        }
        Self
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WsTransport {
    fn open(&self, id: ConnectionId, uri: &str, commands: LinkReceiver, events: EventSink) {
        tokio::spawn(run_connection(id, uri.to_string(), commands, events));
    }
}

// ============================================================================
// Connection Task
// ============================================================================

/// Drives one connection from handshake to close.
async fn run_connection(
    id: ConnectionId,
    uri: String,
    mut commands: LinkReceiver,
    events: EventSink,
) {
    let (ws_stream, response) = match connect_async(uri.as_str()).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!(id = %id, uri = %uri, error = %e, "WebSocket handshake failed");
            let _ = events.send(TransportEvent::Fail {
                id,
                reason: e.to_string(),
            });
            return;
        }
    };

    let remote = response
        .headers()
        .get(SERVER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(UNKNOWN_REMOTE)
        .to_string();

    info!(id = %id, uri = %uri, remote = %remote, "WebSocket connection established");

    if events.send(TransportEvent::Open { id, remote }).is_err() {
        debug!(id = %id, "Event channel closed before open");
        return;
    }

    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut closing = false;

    let terminal = loop {
        tokio::select! {
            // Frames from the exchange
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(id = %id, len = text.len(), "Text frame received");
                        let _ = events.send(TransportEvent::Message {
                            id,
                            text: text.as_str().to_owned(),
                        });
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => {
                                (Some(u16::from(frame.code)), frame.reason.as_str().to_owned())
                            }
                            None => (None, "closed by remote".to_string()),
                        };
                        debug!(id = %id, ?code, reason = %reason, "WebSocket closed");
                        break TransportEvent::Close { id, code, reason };
                    }

                    Some(Err(e)) if closing => {
                        debug!(id = %id, error = %e, "Error after close requested");
                        break TransportEvent::Close {
                            id,
                            code: None,
                            reason: e.to_string(),
                        };
                    }

                    Some(Err(e)) => {
                        warn!(id = %id, error = %e, "WebSocket error");
                        break TransportEvent::Fail {
                            id,
                            reason: e.to_string(),
                        };
                    }

                    None => {
                        debug!(id = %id, "WebSocket stream ended");
                        break TransportEvent::Close {
                            id,
                            code: None,
                            reason: "stream ended".to_string(),
                        };
                    }

                    // Binary, Ping, Pong and raw frames are not surfaced
                    _ => {}
                }
            }

            // Commands from the registry
            command = commands.recv(), if !closing => {
                match command {
                    Some(LinkCommand::Text(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!(id = %id, error = %e, "Failed to send text frame");
                            break TransportEvent::Fail {
                                id,
                                reason: e.to_string(),
                            };
                        }
                        trace!(id = %id, "Text frame sent");
                    }

                    Some(LinkCommand::Close { code, reason }) => {
                        closing = true;
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.clone().into(),
                        };

                        if let Err(e) = ws_write.send(Message::Close(Some(frame))).await {
                            debug!(id = %id, error = %e, "Failed to send close frame");
                            break TransportEvent::Close {
                                id,
                                code: Some(code),
                                reason,
                            };
                        }
                        debug!(id = %id, code, "Close frame sent");
                    }

                    None => {
                        debug!(id = %id, "Link dropped, closing");
                        let _ = ws_write.close().await;
                        break TransportEvent::Close {
                            id,
                            code: None,
                            reason: "link dropped".to_string(),
                        };
                    }
                }
            }
        }
    };

    let _ = events.send(terminal);
    debug!(id = %id, "Connection task terminated");
}

// ============================================================================
// Tests
// ============================================================================
