//! crates/simricare_core/src/sync_status.rs
//!
//! Connectivity-driven synchronization of the offline queue.
//!
//! `SyncMachine` is the pure state machine: it consumes events and clock
//! ticks and answers with the actions to perform. `SyncCoordinator` wires it to
//! a queue, a document store, a network probe and a clock.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::offline_queue::{DrainOutcome, DrainStop, OfflineQueue};
use crate::ports::{Clock, DocumentStore, NetworkStatus};

/// How often the pending count is refreshed.
pub const QUEUE_POLL_INTERVAL_SECS: i64 = 5;
/// Delay between start-up and the first sync attempt.
pub const INITIAL_SYNC_DELAY_SECS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Offline { pending: usize },
    Online { pending: usize },
    Syncing { pending: usize },
}

impl SyncStatus {
    pub fn pending(&self) -> usize {
        match *self {
            SyncStatus::Offline { pending }
            | SyncStatus::Online { pending }
            | SyncStatus::Syncing { pending } => pending,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SyncStatus::Offline { .. } => "오프라인",
            SyncStatus::Online { pending: 0 } => "동기화됨",
            SyncStatus::Online { .. } => "동기화 대기",
            SyncStatus::Syncing { .. } => "동기화 중",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    WentOnline,
    WentOffline,
    QueueCount(usize),
    /// The user asked for a sync.
    SyncRequested,
    DrainFinished(DrainOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    StartDrain,
    RefreshQueueCount,
}

#[derive(Debug, Clone)]
pub struct SyncMachine {
    status: SyncStatus,
    started_at: DateTime<Utc>,
    last_poll: Option<DateTime<Utc>>,
    initial_sync_done: bool,
}

impl SyncMachine {
    pub fn new(online: bool, now: DateTime<Utc>) -> Self {
        let status = if online {
            SyncStatus::Online { pending: 0 }
        } else {
            SyncStatus::Offline { pending: 0 }
        };
        Self {
            status,
            started_at: now,
            last_poll: None,
            initial_sync_done: false,
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Enters `Syncing` from any `Online` state, including `pending: 0`. The
    /// count is only refreshed every `QUEUE_POLL_INTERVAL_SECS`, so a zero may
    /// be stale; draining an empty queue is a no-op.
    fn start_drain(&mut self) -> Option<SyncAction> {
        match self.status {
            SyncStatus::Online { pending } => {
                self.status = SyncStatus::Syncing { pending };
                Some(SyncAction::StartDrain)
            }
            _ => None,
        }
    }

    pub fn handle(&mut self, event: SyncEvent) -> Option<SyncAction> {
        let pending = self.status.pending();
        match event {
            SyncEvent::WentOnline => match self.status {
                SyncStatus::Offline { .. } => {
                    self.status = SyncStatus::Online { pending };
                    self.start_drain()
                }
                _ => None,
            },
            SyncEvent::WentOffline => {
                // A running drain notices on its own and reports back.
                self.status = SyncStatus::Offline { pending };
                None
            }
            SyncEvent::QueueCount(count) => {
                self.status = match self.status {
                    SyncStatus::Offline { .. } => SyncStatus::Offline { pending: count },
                    SyncStatus::Online { .. } => SyncStatus::Online { pending: count },
                    SyncStatus::Syncing { .. } => SyncStatus::Syncing { pending: count },
                };
                None
            }
            SyncEvent::SyncRequested => self.start_drain(),
            SyncEvent::DrainFinished(outcome) => {
                self.status = match (self.status, &outcome.stopped) {
                    (SyncStatus::Offline { .. }, _) | (_, Some(DrainStop::WentOffline)) => {
                        SyncStatus::Offline {
                            pending: outcome.remaining,
                        }
                    }
                    _ => SyncStatus::Online {
                        pending: outcome.remaining,
                    },
                };
                None
            }
        }
    }

    /// Advances the timers: the one-shot initial sync and the count poll.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<SyncAction> {
        let mut actions = Vec::new();

        let poll_due = self
            .last_poll
            .map_or(true, |last| now - last >= Duration::seconds(QUEUE_POLL_INTERVAL_SECS));
        if poll_due {
            self.last_poll = Some(now);
            actions.push(SyncAction::RefreshQueueCount);
        }

        if !self.initial_sync_done
            && now - self.started_at >= Duration::seconds(INITIAL_SYNC_DELAY_SECS)
        {
            self.initial_sync_done = true;
            actions.extend(self.start_drain());
        }
        actions
    }
}

/// Browser connectivity signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

pub struct SyncCoordinator {
    machine: Mutex<SyncMachine>,
    queue: Arc<OfflineQueue>,
    remote: Arc<dyn DocumentStore>,
    network: Arc<dyn NetworkStatus>,
    clock: Arc<dyn Clock>,
}

impl SyncCoordinator {
    pub fn new(
        queue: Arc<OfflineQueue>,
        remote: Arc<dyn DocumentStore>,
        network: Arc<dyn NetworkStatus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let machine = SyncMachine::new(network.is_online(), clock.now());
        Self {
            machine: Mutex::new(machine),
            queue,
            remote,
            network,
            clock,
        }
    }

    pub async fn status(&self) -> SyncStatus {
        self.machine.lock().await.status()
    }

    pub async fn on_connectivity(&self, change: Connectivity) -> SyncStatus {
        let event = match change {
            Connectivity::Online => SyncEvent::WentOnline,
            Connectivity::Offline => SyncEvent::WentOffline,
        };
        info!(?change, "Connectivity changed");
        let action = self.machine.lock().await.handle(event);
        self.perform(action.into_iter().collect()).await
    }

    /// Manual "sync now".
    pub async fn sync_now(&self) -> SyncStatus {
        let action = self.machine.lock().await.handle(SyncEvent::SyncRequested);
        self.perform(action.into_iter().collect()).await
    }

    pub async fn tick(&self) -> SyncStatus {
        let now = self.clock.now();
        let actions = self.machine.lock().await.tick(now);
        self.perform(actions).await
    }

    async fn perform(&self, actions: Vec<SyncAction>) -> SyncStatus {
        for action in actions {
            match action {
                SyncAction::RefreshQueueCount => {
                    let count = self.queue.len().await;
                    self.machine.lock().await.handle(SyncEvent::QueueCount(count));
                }
                SyncAction::StartDrain => {
                    debug!("Starting offline queue drain");
                    let outcome = self
                        .queue
                        .process_while_online(self.remote.as_ref(), self.network.as_ref())
                        .await;
                    self.machine
                        .lock()
                        .await
                        .handle(SyncEvent::DrainFinished(outcome));
                }
            }
        }
        self.status().await
    }

    /// Drives the coordinator from connectivity events and a poll timer until
    /// the event channel closes.
    pub async fn run(&self, mut events: mpsc::Receiver<Connectivity>) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(
            (INITIAL_SYNC_DELAY_SECS * 1000) as u64,
        ));
        loop {
            tokio::select! {
                change = events.recv() => match change {
                    Some(change) => {
                        self.on_connectivity(change).await;
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
        debug!("Sync coordinator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QueuedOperation;
    use crate::offline_queue::tests::FakeStorage;
    use crate::repository::tests::FakeStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn reconnect_with_pending_work_starts_a_drain() {
        let mut machine = SyncMachine::new(false, t0());
        machine.handle(SyncEvent::QueueCount(3));
        assert_eq!(machine.status(), SyncStatus::Offline { pending: 3 });

        assert_eq!(machine.handle(SyncEvent::WentOnline), Some(SyncAction::StartDrain));
        assert_eq!(machine.status(), SyncStatus::Syncing { pending: 3 });

        // A second request while syncing is ignored.
        assert_eq!(machine.handle(SyncEvent::SyncRequested), None);

        machine.handle(SyncEvent::DrainFinished(DrainOutcome {
            replayed: 3,
            remaining: 0,
            stopped: None,
        }));
        assert_eq!(machine.status(), SyncStatus::Online { pending: 0 });
        assert_eq!(machine.status().label(), "동기화됨");
    }

    #[tokio::test]
    async fn drain_runs_even_when_the_polled_count_is_stale() {
        let queue = Arc::new(OfflineQueue::new(Arc::new(FakeStorage::default())));
        let store = Arc::new(FakeStore::default());
        let network = Arc::new(Switch(AtomicBool::new(true)));
        let clock = Arc::new(ManualClock(StdMutex::new(t0())));
        let coordinator =
            SyncCoordinator::new(queue.clone(), store.clone(), network, clock.clone());

        assert_eq!(coordinator.tick().await, SyncStatus::Online { pending: 0 });
        queue
            .enqueue(QueuedOperation::create("chatMessages", json!({ "m": 1 }), t0()))
            .await;
        assert_eq!(coordinator.status().await, SyncStatus::Online { pending: 0 });

        let status = coordinator.sync_now().await;
        assert_eq!(status, SyncStatus::Online { pending: 0 });
        assert!(queue.is_empty().await);
        assert_eq!(store.calls.lock().await.len(), 1);
    }

    #[test]
    fn losing_connectivity_mid_drain_ends_offline() {
        let mut machine = SyncMachine::new(true, t0());
        machine.handle(SyncEvent::QueueCount(2));
        machine.handle(SyncEvent::SyncRequested);
        machine.handle(SyncEvent::WentOffline);

        machine.handle(SyncEvent::DrainFinished(DrainOutcome {
            replayed: 1,
            remaining: 1,
            stopped: Some(DrainStop::WentOffline),
        }));
        assert_eq!(machine.status(), SyncStatus::Offline { pending: 1 });
        assert_eq!(machine.handle(SyncEvent::SyncRequested), None);
    }

    #[test]
    fn failed_drain_returns_online_with_remaining_work() {
        let mut machine = SyncMachine::new(true, t0());
        machine.handle(SyncEvent::SyncRequested);
        machine.handle(SyncEvent::DrainFinished(DrainOutcome {
            replayed: 0,
            remaining: 4,
            stopped: Some(DrainStop::Failed {
                operation_id: "op".to_string(),
                error: "boom".to_string(),
            }),
        }));
        assert_eq!(machine.status(), SyncStatus::Online { pending: 4 });
    }

    #[test]
    fn timers_poll_every_five_seconds_and_sync_once_after_one() {
        let mut machine = SyncMachine::new(true, t0());

        assert_eq!(machine.tick(t0()), vec![SyncAction::RefreshQueueCount]);
        assert!(machine.tick(t0() + Duration::milliseconds(500)).is_empty());
        assert_eq!(
            machine.tick(t0() + Duration::seconds(1)),
            vec![SyncAction::StartDrain]
        );
        machine.handle(SyncEvent::DrainFinished(DrainOutcome {
            replayed: 0,
            remaining: 0,
            stopped: None,
        }));
        assert!(machine.tick(t0() + Duration::seconds(3)).is_empty());
        assert_eq!(
            machine.tick(t0() + Duration::seconds(5)),
            vec![SyncAction::RefreshQueueCount]
        );
    }

    #[test]
    fn initial_sync_is_skipped_while_offline() {
        let mut machine = SyncMachine::new(false, t0());
        machine.tick(t0());
        assert!(machine.tick(t0() + Duration::seconds(2)).is_empty());
        assert_eq!(machine.status(), SyncStatus::Offline { pending: 0 });
    }

    struct ManualClock(StdMutex<DateTime<Utc>>);

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    struct Switch(AtomicBool);

    impl NetworkStatus for Switch {
        fn is_online(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn coordinator_drains_queue_when_connection_returns() {
        let queue = Arc::new(OfflineQueue::new(Arc::new(FakeStorage::default())));
        let store = Arc::new(FakeStore::default());
        let network = Arc::new(Switch(AtomicBool::new(false)));
        let clock = Arc::new(ManualClock(StdMutex::new(t0())));
        let coordinator =
            SyncCoordinator::new(queue.clone(), store.clone(), network.clone(), clock.clone());

        for i in 0..2 {
            queue
                .enqueue(QueuedOperation::create("dailyRecords", json!({ "n": i }), t0()))
                .await;
        }
        assert_eq!(coordinator.tick().await, SyncStatus::Offline { pending: 2 });

        network.0.store(true, Ordering::SeqCst);
        let status = coordinator.on_connectivity(Connectivity::Online).await;

        assert_eq!(status, SyncStatus::Online { pending: 0 });
        assert!(queue.is_empty().await);
        assert_eq!(store.calls.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn run_stops_when_the_event_channel_closes() {
        let queue = Arc::new(OfflineQueue::new(Arc::new(FakeStorage::default())));
        let network = Arc::new(Switch(AtomicBool::new(true)));
        let coordinator = SyncCoordinator::new(
            queue,
            Arc::new(FakeStore::default()),
            network,
            Arc::new(crate::ports::SystemClock),
        );

        let (tx, rx) = mpsc::channel(4);
        tx.send(Connectivity::Offline).await.unwrap();
        drop(tx);
        coordinator.run(rx).await;

        assert!(matches!(coordinator.status().await, SyncStatus::Offline { .. }));
    }
}
