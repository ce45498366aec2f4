#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use civica_kernel_contracts::subscription::{
    ComplaintEvent, ConnectionId, Subscription, SubscriptionPatch,
};

/// Per-connection notification preferences for exactly one process. Not
/// persisted; rebuilt from nothing on restart, so every client re-subscribes
/// after reconnecting.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    state: Arc<Mutex<BTreeMap<ConnectionId, Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Registry mutations are total, so a poisoned lock still holds a
    // coherent map.
    fn lock_state(&self) -> MutexGuard<'_, BTreeMap<ConnectionId, Subscription>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registers (or resets) a connection with the receive-everything
    /// default.
    pub fn register(&self, connection_id: &ConnectionId) -> Subscription {
        let subscription = Subscription::default_all();
        self.lock_state()
            .insert(connection_id.clone(), subscription.clone());
        subscription
    }

    /// Partial update. An unknown connection id is a no-op, not an error.
    pub fn update(&self, connection_id: &ConnectionId, patch: &SubscriptionPatch) -> bool {
        let mut state = self.lock_state();
        match state.get_mut(connection_id) {
            Some(subscription) => {
                subscription.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Idempotent removal.
    pub fn remove(&self, connection_id: &ConnectionId) -> bool {
        self.lock_state().remove(connection_id).is_some()
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<Subscription> {
        self.lock_state().get(connection_id).cloned()
    }

    /// Cloned snapshot for iteration without holding the map lock during
    /// serialization or sends.
    pub fn snapshot(&self) -> Vec<(ConnectionId, Subscription)> {
        self.lock_state()
            .iter()
            .map(|(id, subscription)| (id.clone(), subscription.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock_state().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().is_empty()
    }

    /// Union of all registered filter preferences, used when re-announcing
    /// interest to an upstream source after a reconnect.
    pub fn merged_preferences(&self) -> Subscription {
        let state = self.lock_state();
        let mut merged = Subscription {
            categories: Default::default(),
            priorities: Default::default(),
            locations: Default::default(),
            notify_on_new_complaints: false,
            notify_on_status_change: false,
        };
        for subscription in state.values() {
            merged
                .categories
                .extend(subscription.categories.iter().copied());
            merged
                .priorities
                .extend(subscription.priorities.iter().copied());
            merged.locations.extend(subscription.locations.iter().cloned());
            merged.notify_on_new_complaints |= subscription.notify_on_new_complaints;
            merged.notify_on_status_change |= subscription.notify_on_status_change;
        }
        merged
    }
}

/// Filter semantics: AND across dimensions, OR within a dimension. An empty
/// filter set matches anything in that dimension. Status changes are gated
/// on the flag alone and are never content-filtered.
pub fn event_matches(subscription: &Subscription, event: &ComplaintEvent) -> bool {
    match event {
        ComplaintEvent::StatusChanged(_) => subscription.notify_on_status_change,
        ComplaintEvent::NewComplaint(record) => {
            if !subscription.notify_on_new_complaints {
                return false;
            }
            if !subscription.categories.is_empty()
                && !subscription.categories.contains(&record.category)
            {
                return false;
            }
            if !subscription.priorities.is_empty()
                && !subscription.priorities.contains(&record.priority)
            {
                return false;
            }
            if !subscription.locations.is_empty()
                && !subscription.locations.contains(&record.location)
            {
                return false;
            }
            true
        }
    }
}
