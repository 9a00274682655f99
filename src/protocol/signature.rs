//! Request signing for the `client_signature` grant.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use chrono::Utc;
use ring::hmac;
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Length of generated nonces.
const NONCE_LEN: usize = 8;

// ============================================================================
// Signing
// ============================================================================

/// Computes the uppercase hex HMAC-SHA256 of `"{timestamp}\n{nonce}\n{data}"`
/// keyed by `secret`.
#[must_use]
pub fn signature(timestamp_ms: i64, nonce: &str, data: &str, secret: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let message = format!("{timestamp_ms}\n{nonce}\n{data}");
    let tag = hmac::sign(&key, message.as_bytes());
    hex::encode_upper(tag.as_ref())
}

/// Returns a random alphanumeric nonce.
#[must_use]
pub fn nonce() -> String {
    let mut simple = Uuid::new_v4().simple().to_string();
    simple.truncate(NONCE_LEN);
    simple
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[inline]
#[must_use]
pub fn timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ============================================================================
// Credential
// ============================================================================

/// API key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    client_id: String,
    client_secret: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl Credential {
    /// Creates a credential.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Returns the client id.
    #[inline]
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Signs `data` with this credential's secret.
    #[inline]
    #[must_use]
    pub fn sign(&self, timestamp_ms: i64, nonce: &str, data: &str) -> String {
        signature(timestamp_ms, nonce, data, &self.client_secret)
    }
}

// ============================================================================
// Tests
// ============================================================================
