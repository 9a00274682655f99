//! Active price index subscriptions.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::identifiers::ConnectionId;

use super::command::{Command, PRICE_INDEX_PREFIX};

// ============================================================================
// SubscriptionSet
// ============================================================================

/// Channel name to the connection it was subscribed on.
///
/// Iteration is ordered by channel name.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSet {
    channels: BTreeMap<String, ConnectionId>,
}

impl SubscriptionSet {
    /// Creates an empty set.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a subscription. Returns `false` if the channel was already
    /// present, in which case its connection is updated.
    pub fn insert(&mut self, channel: impl Into<String>, id: ConnectionId) -> bool {
        self.channels.insert(channel.into(), id).is_none()
    }

    /// Forgets a subscription.
    pub fn remove(&mut self, channel: &str) -> Option<ConnectionId> {
        self.channels.remove(channel)
    }

    /// Applies a successful subscribe or unsubscribe sent on `id`.
    ///
    /// Other commands are ignored.
    pub fn apply(&mut self, command: &Command, id: ConnectionId) {
        match command {
            Command::Subscribe { .. } => {
                if let Some(channel) = command.channel() {
                    self.insert(channel, id);
                }
            }
            Command::Unsubscribe { .. } => {
                if let Some(channel) = command.channel() {
                    self.remove(&channel);
                }
            }
            _ => {}
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Iterates `(channel, connection)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ConnectionId)> {
        self.channels.iter().map(|(channel, id)| (channel.as_str(), *id))
    }

    /// Returns the distinct connections carrying subscriptions, ascending.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.channels.values().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Iterates `(index name, connection)` pairs, e.g. `btc_usd`.
    ///
    /// Channels outside the price index family are listed by channel name.
    pub fn indices(&self) -> impl Iterator<Item = (&str, ConnectionId)> {
        self.iter().map(|(channel, id)| {
            (channel.strip_prefix(PRICE_INDEX_PREFIX).unwrap_or(channel), id)
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
