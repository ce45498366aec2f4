#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use civica_kernel_contracts::subscription::{ComplaintEvent, LinkState, Subscription};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::router::NotificationRouter;

/// Fixed retry delay for the upstream link. Deliberately not exponential:
/// at this scale a constant 5 s cadence with unbounded retries is the
/// documented policy.
pub const UPSTREAM_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    pub retry_delay: Duration,
}

impl RelayConfig {
    pub fn mvp_v1() -> Self {
        Self {
            retry_delay: UPSTREAM_RETRY_DELAY,
        }
    }
}

/// One established link to the upstream source: an inbound event stream and
/// a channel for announcing this process's interest set.
#[derive(Debug)]
pub struct UpstreamSession {
    pub events: mpsc::Receiver<ComplaintEvent>,
    pub preferences: mpsc::Sender<Subscription>,
}

/// Transport seam for the upstream link. The connector owns the handshake;
/// the relay owns the lifecycle and retry policy.
pub trait UpstreamConnector: Send + Sync {
    fn connect(&self) -> Result<UpstreamSession, String>;
}

/// Relays complaint events from an upstream source into the local router.
/// Local subscriptions live in the registry, not on the wire, so an
/// upstream reconnect re-announces the current preference union without
/// touching local state.
pub struct UpstreamRelay {
    config: RelayConfig,
    connector: Arc<dyn UpstreamConnector>,
    router: NotificationRouter,
    state: Arc<Mutex<LinkState>>,
}

impl UpstreamRelay {
    pub fn new(
        config: RelayConfig,
        connector: Arc<dyn UpstreamConnector>,
        router: NotificationRouter,
    ) -> Self {
        Self {
            config,
            connector,
            router,
            state: Arc::new(Mutex::new(LinkState::Disconnected)),
        }
    }

    pub fn link_state(&self) -> LinkState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_state(&self, next: LinkState) {
        match self.state.lock() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Drives the link forever: Disconnected -> Connecting -> Open, then
    /// back to Disconnected on any failure, with a fixed retry delay.
    /// Upstream failures never disturb already-attached local subscribers.
    pub async fn run(&self) {
        loop {
            self.set_state(LinkState::Connecting);
            let session = match self.connector.connect() {
                Ok(session) => session,
                Err(reason) => {
                    self.set_state(LinkState::Erroring);
                    warn!(reason, "upstream connect failed, retrying");
                    self.set_state(LinkState::Disconnected);
                    tokio::time::sleep(self.config.retry_delay).await;
                    continue;
                }
            };

            self.set_state(LinkState::Open);
            info!("upstream link open");

            // Re-announce interest: preferences live in the registry, so a
            // reconnect does not lose them.
            let merged = self.router.registry().merged_preferences();
            if session.preferences.send(merged).await.is_err() {
                warn!("upstream rejected preference announcement");
            }

            let mut events = session.events;
            while let Some(event) = events.recv().await {
                self.router.broadcast(&event);
            }

            self.set_state(LinkState::Closing);
            info!("upstream link closed, scheduling reconnect");
            self.set_state(LinkState::Disconnected);
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civica_engines::assembler::ComplaintAssembler;
    use civica_kernel_contracts::complaint::{ComplaintDraft, ComplaintRecord, IntakeMethod};
    use civica_kernel_contracts::subscription::ConnectionId;
    use civica_kernel_contracts::UnixTimeMs;
    use std::collections::VecDeque;

    fn record(text: &str) -> ComplaintRecord {
        ComplaintAssembler::mvp_v1()
            .assemble(
                &ComplaintDraft::v1(text, None, None, "en", IntakeMethod::Manual).unwrap(),
                UnixTimeMs(77_000),
            )
            .unwrap()
    }

    struct ScriptedConnector {
        sessions: Mutex<VecDeque<Result<UpstreamSession, String>>>,
    }

    impl ScriptedConnector {
        fn new(sessions: Vec<Result<UpstreamSession, String>>) -> Self {
            Self {
                sessions: Mutex::new(sessions.into_iter().collect()),
            }
        }
    }

    impl UpstreamConnector for ScriptedConnector {
        fn connect(&self) -> Result<UpstreamSession, String> {
            self.sessions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("no more scripted sessions".to_string()))
        }
    }

    fn fast_config() -> RelayConfig {
        RelayConfig {
            retry_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn at_relay_01_forwards_upstream_events_to_local_subscribers() {
        let router = NotificationRouter::default();
        let mut local_rx = router.attach(&ConnectionId::new("local").unwrap());

        let (event_tx, event_rx) = mpsc::channel(8);
        let (pref_tx, _pref_rx) = mpsc::channel(8);
        let connector = Arc::new(ScriptedConnector::new(vec![Ok(UpstreamSession {
            events: event_rx,
            preferences: pref_tx,
        })]));

        let relay = Arc::new(UpstreamRelay::new(fast_config(), connector, router));
        let relay_task = {
            let relay = relay.clone();
            tokio::spawn(async move { relay.run().await })
        };

        let event = ComplaintEvent::NewComplaint(record("water leak upstream"));
        event_tx.send(event.clone()).await.unwrap();

        let received = local_rx.recv().await.unwrap();
        assert_eq!(received, event);
        relay_task.abort();
    }

    #[tokio::test]
    async fn at_relay_02_reconnect_re_announces_preferences() {
        let router = NotificationRouter::default();
        let _local_rx = router.attach(&ConnectionId::new("local").unwrap());

        let (event_tx_1, event_rx_1) = mpsc::channel(8);
        let (pref_tx_1, mut pref_rx_1) = mpsc::channel(8);
        let (_event_tx_2, event_rx_2) = mpsc::channel::<ComplaintEvent>(8);
        let (pref_tx_2, mut pref_rx_2) = mpsc::channel(8);

        let connector = Arc::new(ScriptedConnector::new(vec![
            Ok(UpstreamSession {
                events: event_rx_1,
                preferences: pref_tx_1,
            }),
            Ok(UpstreamSession {
                events: event_rx_2,
                preferences: pref_tx_2,
            }),
        ]));

        let relay = Arc::new(UpstreamRelay::new(fast_config(), connector, router));
        let relay_task = {
            let relay = relay.clone();
            tokio::spawn(async move { relay.run().await })
        };

        let first = pref_rx_1.recv().await.unwrap();
        assert!(first.notify_on_new_complaints);

        // Dropping the first session's event sender closes the link; the
        // relay must reconnect and announce again.
        drop(event_tx_1);
        let second = pref_rx_2.recv().await.unwrap();
        assert!(second.notify_on_new_complaints);
        relay_task.abort();
    }

    #[tokio::test]
    async fn at_relay_03_connect_failure_retries_until_success() {
        let router = NotificationRouter::default();
        let (pref_tx, mut pref_rx) = mpsc::channel(8);
        let (_event_tx, event_rx) = mpsc::channel::<ComplaintEvent>(8);

        let connector = Arc::new(ScriptedConnector::new(vec![
            Err("upstream down".to_string()),
            Err("upstream still down".to_string()),
            Ok(UpstreamSession {
                events: event_rx,
                preferences: pref_tx,
            }),
        ]));

        let relay = Arc::new(UpstreamRelay::new(fast_config(), connector, router));
        let relay_task = {
            let relay = relay.clone();
            tokio::spawn(async move { relay.run().await })
        };

        // Two failures then an open link that announces preferences.
        assert!(pref_rx.recv().await.is_some());
        assert_eq!(relay.link_state(), LinkState::Open);
        relay_task.abort();
    }
}
