//! JSON-RPC request and response message types.
//!
//! # Request
//!
//! ```json
//! { "jsonrpc": "2.0", "id": 7, "method": "public/get_order_book", "params": { ... } }
//! ```
//!
//! # Response
//!
//! Success carries `result`, failure carries `error`:
//!
//! ```json
//! { "jsonrpc": "2.0", "id": 7, "result": { ... } }
//! { "jsonrpc": "2.0", "id": 7, "error": { "code": 13009, "message": "unauthorized" } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// RpcRequest
// ============================================================================

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,

    /// Correlation id echoed by the server.
    pub id: RequestId,

    /// `public/...` or `private/...` method name.
    pub method: String,

    /// Named parameters.
    pub params: Map<String, Value>,
}

impl RpcRequest {
    /// Creates a request with the next process-wide id.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self::with_id(RequestId::next(), method, params)
    }

    /// Creates a request with a specific id.
    #[inline]
    #[must_use]
    pub fn with_id(id: RequestId, method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }

    /// Serializes to the compact text frame sent on the wire.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if a parameter cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// RpcResponse
// ============================================================================

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    /// Matches the request `id`.
    #[serde(default)]
    pub id: Option<RequestId>,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error object (if error).
    #[serde(default)]
    pub error: Option<RpcError>,
}

/// Error object of a failed call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcError {
    /// Exchange error code.
    pub code: i64,

    /// Human-readable message.
    pub message: String,

    /// Extra detail, if any.
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcResponse {
    /// Parses a reply frame.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if the text is not a JSON-RPC response object.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Returns `true` for a reply to a request that carries no error.
    ///
    /// Notifications have no `id` and are never successful replies.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.id.is_some() && self.error.is_none()
    }

    /// Returns `true` if this is the reply to request `id`.
    #[inline]
    #[must_use]
    pub fn is_reply_to(&self, id: RequestId) -> bool {
        self.id == Some(id)
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] with the exchange code and message.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            None => Ok(self.result.unwrap_or(Value::Null)),
            Some(error) => Err(Error::protocol(format!(
                "{} (code {})",
                error.message, error.code
            ))),
        }
    }

    /// Gets a string value from the result.
    ///
    /// Returns empty string if key not found or not a string.
    #[inline]
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

/// Pretty-prints a reply for the terminal, or returns it unchanged if it is
/// not JSON.
#[must_use]
pub fn pretty(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| text.to_string())
}

// ============================================================================
// Tests
// ============================================================================
