//! Per-client event-type filters.

use std::collections::{HashMap, HashSet};

use taskbridge_core::ClientId;

/// Matches every event type.
pub const WILDCARD: &str = "*";

/// Socket-side alias for `state`.
const STATE_ALIAS: &str = "state_update";

/// Event subscriptions keyed by client.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: HashMap<ClientId, HashSet<String>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the client's subscription.
    pub fn subscribe(
        &mut self,
        client_id: &ClientId,
        event_types: impl IntoIterator<Item = String>,
    ) {
        let set: HashSet<String> = event_types
            .into_iter()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .collect();
        let _ = self.subscriptions.insert(client_id.clone(), set);
    }

    /// Remove the client's subscription. Returns whether one existed.
    pub fn unsubscribe(&mut self, client_id: &ClientId) -> bool {
        self.subscriptions.remove(client_id).is_some()
    }

    /// Whether `client_id` should receive events of `event_type`.
    ///
    /// Clients without a subscription receive everything addressed to them.
    pub fn accepts(&self, client_id: &ClientId, event_type: &str) -> bool {
        self.subscriptions
            .get(client_id)
            .is_none_or(|set| matches(set, event_type))
    }

    /// Whether the client explicitly subscribed to state events.
    pub fn wants_state(&self, client_id: &ClientId) -> bool {
        self.subscriptions
            .get(client_id)
            .is_some_and(|set| matches(set, "state"))
    }

    /// The client's subscribed types, sorted.
    pub fn subscription(&self, client_id: &ClientId) -> Option<Vec<String>> {
        self.subscriptions.get(client_id).map(|set| {
            let mut types: Vec<String> = set.iter().cloned().collect();
            types.sort();
            types
        })
    }

    /// Number of clients with a subscription.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether no client has a subscription.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

fn matches(set: &HashSet<String>, event_type: &str) -> bool {
    set.contains(WILDCARD)
        || set.contains(event_type)
        || (event_type == "state" && set.contains(STATE_ALIAS))
}
