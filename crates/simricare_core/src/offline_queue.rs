//! crates/simricare_core/src/offline_queue.rs
//!
//! Buffers writes attempted while offline and replays them, oldest first,
//! once connectivity returns.
//!
//! The queue lives as one JSON array under a single storage key. Access from
//! one process is serialized; several processes sharing the same storage
//! (e.g. two browser tabs) are not coordinated and can overwrite each other.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{OperationKind, QueuedOperation};
use crate::ports::{DocumentStore, KeyValueStore, NetworkStatus, PortError, PortResult};

pub const OFFLINE_QUEUE_KEY: &str = "offlineQueue";

/// Why a drain stopped before the queue was empty.
#[derive(Debug, Clone, PartialEq)]
pub enum DrainStop {
    /// Replaying an operation failed. It and everything after it stay queued.
    Failed { operation_id: String, error: String },
    /// Connectivity dropped between two replays.
    WentOffline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrainOutcome {
    pub replayed: usize,
    pub remaining: usize,
    pub stopped: Option<DrainStop>,
}

impl DrainOutcome {
    pub fn is_complete(&self) -> bool {
        self.stopped.is_none() && self.remaining == 0
    }
}

struct AlwaysOnline;

impl NetworkStatus for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

pub struct OfflineQueue {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    state: Mutex<()>,
    draining: Mutex<()>,
}

impl OfflineQueue {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(storage, OFFLINE_QUEUE_KEY)
    }

    pub fn with_key(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            state: Mutex::new(()),
            draining: Mutex::new(()),
        }
    }

    fn load(&self) -> Vec<QueuedOperation> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read offline queue: {}", e);
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Discarding unreadable offline queue: {}", e);
            Vec::new()
        })
    }

    fn save(&self, operations: &[QueuedOperation]) -> PortResult<()> {
        if operations.is_empty() {
            return self.storage.remove(&self.key);
        }
        let raw = serde_json::to_string(operations)?;
        self.storage.set(&self.key, &raw)
    }

    /// Appends an operation and returns the new queue length.
    ///
    /// Never fails: a storage error is logged and the operation is dropped.
    pub async fn enqueue(&self, operation: QueuedOperation) -> usize {
        let _guard = self.state.lock().await;
        let mut operations = self.load();
        debug!(
            operation_id = %operation.id,
            collection = %operation.collection,
            "queueing offline operation"
        );
        operations.push(operation);
        if let Err(e) = self.save(&operations) {
            warn!("Failed to persist offline queue: {}", e);
            return operations.len() - 1;
        }
        operations.len()
    }

    pub async fn get_offline_queue(&self) -> Vec<QueuedOperation> {
        let _guard = self.state.lock().await;
        self.load()
    }

    pub async fn len(&self) -> usize {
        self.get_offline_queue().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every pending operation.
    pub async fn clear(&self) -> PortResult<()> {
        let _guard = self.state.lock().await;
        self.storage.remove(&self.key)
    }

    /// Replays every queued operation in insertion order.
    pub async fn process_offline_queue(&self, remote: &dyn DocumentStore) -> DrainOutcome {
        self.process_while_online(remote, &AlwaysOnline).await
    }

    /// Like `process_offline_queue`, but stops as soon as `network` reports
    /// the host offline.
    pub async fn process_while_online(
        &self,
        remote: &dyn DocumentStore,
        network: &dyn NetworkStatus,
    ) -> DrainOutcome {
        let _draining = self.draining.lock().await;
        let mut replayed = 0;

        loop {
            let head = {
                let _guard = self.state.lock().await;
                self.load().into_iter().next()
            };
            let Some(operation) = head else {
                break;
            };

            if !network.is_online() {
                let remaining = self.len().await;
                info!(replayed, remaining, "Offline queue drain paused: connection lost");
                return DrainOutcome {
                    replayed,
                    remaining,
                    stopped: Some(DrainStop::WentOffline),
                };
            }

            if let Err(e) = replay(remote, &operation).await {
                let remaining = self.len().await;
                warn!(
                    operation_id = %operation.id,
                    remaining,
                    "Offline queue drain stopped: {}", e
                );
                return DrainOutcome {
                    replayed,
                    remaining,
                    stopped: Some(DrainStop::Failed {
                        operation_id: operation.id,
                        error: e.to_string(),
                    }),
                };
            }

            let _guard = self.state.lock().await;
            let mut operations = self.load();
            operations.retain(|op| op.id != operation.id);
            if let Err(e) = self.save(&operations) {
                // The replayed operation stays queued and will be sent again.
                warn!("Failed to persist offline queue after replay: {}", e);
                return DrainOutcome {
                    replayed: replayed + 1,
                    remaining: operations.len() + 1,
                    stopped: Some(DrainStop::Failed {
                        operation_id: operation.id,
                        error: e.to_string(),
                    }),
                };
            }
            replayed += 1;
        }

        if replayed > 0 {
            info!(replayed, "Offline queue drained");
        }
        DrainOutcome {
            replayed,
            remaining: 0,
            stopped: None,
        }
    }
}

async fn replay(remote: &dyn DocumentStore, operation: &QueuedOperation) -> PortResult<()> {
    let target = || {
        operation.document_id.as_deref().ok_or_else(|| {
            PortError::Invalid(format!(
                "{:?} operation {} has no document id",
                operation.kind, operation.id
            ))
        })
    };

    match operation.kind {
        OperationKind::Create => {
            remote
                .insert(
                    &operation.collection,
                    operation.document_id.as_deref(),
                    operation.payload.clone(),
                )
                .await?;
        }
        OperationKind::Update => {
            remote
                .update(&operation.collection, target()?, operation.payload.clone())
                .await?;
        }
        OperationKind::Delete => {
            remote.delete(&operation.collection, target()?).await?;
        }
    }
    Ok(())
}
