#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use civica_engines::registry::{event_matches, SubscriptionRegistry};
use civica_kernel_contracts::subscription::{ComplaintEvent, ConnectionId, SubscriptionPatch};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Bounded depth of each connection's outbound queue. A slow client
    /// fills its own queue and loses messages; it never stalls the others.
    pub outbound_queue_depth: usize,
}

impl RouterConfig {
    pub fn mvp_v1() -> Self {
        Self {
            outbound_queue_depth: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub matched: usize,
    pub delivered: usize,
    pub dropped_full: usize,
    pub detached_closed: usize,
}

/// Fan-out hub for complaint-lifecycle events. Owns the subscription
/// registry plus one bounded outbound queue per connection; delivery is
/// best-effort and a failing connection is detached without disturbing the
/// rest of the broadcast.
#[derive(Debug, Clone)]
pub struct NotificationRouter {
    config: RouterConfig,
    registry: SubscriptionRegistry,
    connections: Arc<Mutex<BTreeMap<ConnectionId, mpsc::Sender<ComplaintEvent>>>>,
}

impl NotificationRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            registry: SubscriptionRegistry::new(),
            connections: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    // Connection-map mutations are total; a poisoned lock still holds a
    // coherent map.
    fn lock_connections(
        &self,
    ) -> MutexGuard<'_, BTreeMap<ConnectionId, mpsc::Sender<ComplaintEvent>>> {
        match self.connections.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registers the connection with the receive-everything default and
    /// returns its outbound queue. Re-attaching an id replaces the previous
    /// queue, which closes the previous consumer.
    pub fn attach(&self, connection_id: &ConnectionId) -> mpsc::Receiver<ComplaintEvent> {
        let (tx, rx) = mpsc::channel(self.config.outbound_queue_depth);
        self.registry.register(connection_id);
        self.lock_connections().insert(connection_id.clone(), tx);
        debug!(connection = connection_id.as_str(), "connection attached");
        rx
    }

    /// Partial preference update; unknown connection ids are a no-op.
    pub fn update_preferences(
        &self,
        connection_id: &ConnectionId,
        patch: &SubscriptionPatch,
    ) -> bool {
        self.registry.update(connection_id, patch)
    }

    /// Idempotent teardown. Safe to call from the read loop and an external
    /// shutdown path concurrently; the registry entry is removed exactly
    /// once.
    pub fn detach(&self, connection_id: &ConnectionId) -> bool {
        let had_queue = self.lock_connections().remove(connection_id).is_some();
        let had_subscription = self.registry.remove(connection_id);
        if had_queue || had_subscription {
            debug!(connection = connection_id.as_str(), "connection detached");
        }
        had_queue || had_subscription
    }

    pub fn connected_count(&self) -> usize {
        self.lock_connections().len()
    }

    /// Fans the event out to every matching subscription. Events are
    /// enqueued in invocation order per caller; a closed queue detaches the
    /// connection, a full queue drops this one message, and neither aborts
    /// the remaining fan-out.
    pub fn broadcast(&self, event: &ComplaintEvent) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        // Snapshot both maps so no lock is held while enqueueing.
        let subscriptions = self.registry.snapshot();
        let senders: BTreeMap<ConnectionId, mpsc::Sender<ComplaintEvent>> = self
            .lock_connections()
            .iter()
            .map(|(id, tx)| (id.clone(), tx.clone()))
            .collect();

        for (connection_id, subscription) in subscriptions {
            if !event_matches(&subscription, event) {
                continue;
            }
            report.matched += 1;

            let Some(tx) = senders.get(&connection_id) else {
                continue;
            };
            match tx.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped_full += 1;
                    warn!(
                        connection = connection_id.as_str(),
                        kind = event.kind(),
                        "outbound queue full, dropping event"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    report.detached_closed += 1;
                    warn!(
                        connection = connection_id.as_str(),
                        kind = event.kind(),
                        "outbound queue closed, detaching connection"
                    );
                    self.detach(&connection_id);
                }
            }
        }
        report
    }
}

impl Default for NotificationRouter {
    fn default() -> Self {
        Self::new(RouterConfig::mvp_v1())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civica_engines::assembler::ComplaintAssembler;
    use civica_kernel_contracts::complaint::{
        ComplaintDraft, ComplaintRecord, IntakeMethod, PriorityTier,
    };
    use civica_kernel_contracts::UnixTimeMs;
    use std::collections::BTreeSet;

    fn connection(id: &str) -> ConnectionId {
        ConnectionId::new(id).unwrap()
    }

    fn record(text: &str) -> ComplaintRecord {
        ComplaintAssembler::mvp_v1()
            .assemble(
                &ComplaintDraft::v1(text, None, None, "en", IntakeMethod::Manual).unwrap(),
                UnixTimeMs(42_000),
            )
            .unwrap()
    }

    fn priorities_patch(priorities: &[PriorityTier]) -> SubscriptionPatch {
        SubscriptionPatch {
            priorities: Some(priorities.iter().copied().collect::<BTreeSet<_>>()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn at_router_01_broadcast_reaches_default_subscribers() {
        let router = NotificationRouter::default();
        let mut rx = router.attach(&connection("c1"));

        let event = ComplaintEvent::NewComplaint(record("water leak"));
        let report = router.broadcast(&event);
        assert_eq!(report.matched, 1);
        assert_eq!(report.delivered, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn at_router_02_closed_queue_detaches_without_aborting_fanout() {
        let router = NotificationRouter::default();
        let mut rx_a = router.attach(&connection("a"));
        let rx_b = router.attach(&connection("b"));
        let mut rx_c = router.attach(&connection("c"));
        drop(rx_b);

        let event = ComplaintEvent::NewComplaint(record("dangerous accident on the bridge"));
        let report = router.broadcast(&event);
        assert_eq!(report.matched, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.detached_closed, 1);

        assert_eq!(rx_a.recv().await.unwrap(), event);
        assert_eq!(rx_c.recv().await.unwrap(), event);
        assert_eq!(router.connected_count(), 2);
        assert_eq!(router.registry().len(), 2);
    }

    #[tokio::test]
    async fn at_router_03_priority_filter_excludes_medium_events() {
        let router = NotificationRouter::default();
        let id = connection("c1");
        let mut rx = router.attach(&id);
        router.update_preferences(
            &id,
            &priorities_patch(&[PriorityTier::Urgent, PriorityTier::High]),
        );

        let medium = record("moderate issue with the tap");
        assert_eq!(medium.priority, PriorityTier::Medium);
        let report = router.broadcast(&ComplaintEvent::NewComplaint(medium));
        assert_eq!(report.matched, 0);
        assert_eq!(report.delivered, 0);
        assert!(rx.try_recv().is_err());

        let urgent = record("dangerous accident near the crossing");
        let report = router.broadcast(&ComplaintEvent::NewComplaint(urgent));
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn at_router_04_full_queue_drops_message_but_keeps_connection() {
        let router = NotificationRouter::new(RouterConfig {
            outbound_queue_depth: 1,
        });
        let mut rx = router.attach(&connection("slow"));

        let first = ComplaintEvent::NewComplaint(record("water leak"));
        let second = ComplaintEvent::NewComplaint(record("power outage"));
        assert_eq!(router.broadcast(&first).delivered, 1);

        let report = router.broadcast(&second);
        assert_eq!(report.dropped_full, 1);
        assert_eq!(report.delivered, 0);
        assert_eq!(router.connected_count(), 1);

        // Only the first event survived in the bounded queue.
        assert_eq!(rx.recv().await.unwrap(), first);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn at_router_05_detach_is_idempotent() {
        let router = NotificationRouter::default();
        let id = connection("c1");
        let _rx = router.attach(&id);

        assert!(router.detach(&id));
        assert!(!router.detach(&id));
        assert_eq!(router.connected_count(), 0);
        assert_eq!(router.registry().len(), 0);
    }

    #[tokio::test]
    async fn at_router_06_status_changes_bypass_content_filters() {
        let router = NotificationRouter::default();
        let id = connection("c1");
        let mut rx = router.attach(&id);
        router.update_preferences(&id, &priorities_patch(&[PriorityTier::Urgent]));

        let medium = record("moderate issue with the tap");
        let report = router.broadcast(&ComplaintEvent::StatusChanged(medium));
        assert_eq!(report.delivered, 1);
        assert!(rx.recv().await.is_some());

        let muted = SubscriptionPatch {
            notify_on_status_change: Some(false),
            ..Default::default()
        };
        router.update_preferences(&id, &muted);
        let report = router.broadcast(&ComplaintEvent::StatusChanged(record("water leak")));
        assert_eq!(report.matched, 0);
    }

    #[tokio::test]
    async fn at_router_07_broadcast_preserves_caller_order() {
        let router = NotificationRouter::default();
        let mut rx = router.attach(&connection("c1"));

        let first = ComplaintEvent::NewComplaint(record("water leak"));
        let second = ComplaintEvent::StatusChanged(record("garbage dump"));
        router.broadcast(&first);
        router.broadcast(&second);

        assert_eq!(rx.recv().await.unwrap(), first);
        assert_eq!(rx.recv().await.unwrap(), second);
    }
}
