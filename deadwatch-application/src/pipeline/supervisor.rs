// Per-server ingestion slots and the mode state machine

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use deadwatch_domain::{IngestMode, ServerId, TenantId};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::batch::BatchSummary;
use super::task::TaskHandle;

const TRANSITION_LOG_CAPACITY: usize = 4096;

type ServerKey = (TenantId, ServerId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeTransition {
    pub tenant_id: TenantId,
    pub server_id: ServerId,
    pub from: IngestMode,
    pub to: IngestMode,
    pub at: DateTime<Utc>,
}

struct SlotState {
    mode: IngestMode,
    batch: Option<TaskHandle<BatchSummary>>,
}

/// Everything the pipeline keeps in memory for one server. Holding `gate`
/// is what makes a reader the single writer of that server's cursors.
pub struct ServerSlot {
    pub tenant_id: TenantId,
    pub server_id: ServerId,
    pub gate: Mutex<()>,
    cancel: CancellationToken,
    state: Mutex<SlotState>,
}

impl ServerSlot {
    /// Cancelled when the server is removed or the process shuts down.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn mode(&self) -> IngestMode {
        self.state.lock().await.mode
    }

    pub async fn batch(&self) -> Option<TaskHandle<BatchSummary>> {
        self.state.lock().await.batch.clone()
    }

    pub async fn set_batch(&self, handle: TaskHandle<BatchSummary>) {
        self.state.lock().await.batch = Some(handle);
    }

    pub async fn take_batch(&self) -> Option<TaskHandle<BatchSummary>> {
        self.state.lock().await.batch.take()
    }
}

pub struct IngestionSupervisor {
    root: CancellationToken,
    slots: Mutex<HashMap<ServerKey, Arc<ServerSlot>>>,
    transitions: Mutex<VecDeque<ModeTransition>>,
}

impl IngestionSupervisor {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            slots: Mutex::new(HashMap::new()),
            transitions: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn slot(&self, tenant_id: &TenantId, server_id: &ServerId) -> Arc<ServerSlot> {
        let mut slots = self.slots.lock().await;
        slots
            .entry((tenant_id.clone(), server_id.clone()))
            .or_insert_with(|| {
                Arc::new(ServerSlot {
                    tenant_id: tenant_id.clone(),
                    server_id: server_id.clone(),
                    gate: Mutex::new(()),
                    cancel: self.root.child_token(),
                    state: Mutex::new(SlotState {
                        mode: IngestMode::Idle,
                        batch: None,
                    }),
                })
            })
            .clone()
    }

    pub async fn existing_slot(&self, tenant_id: &TenantId, server_id: &ServerId) -> Option<Arc<ServerSlot>> {
        self.slots
            .lock()
            .await
            .get(&(tenant_id.clone(), server_id.clone()))
            .cloned()
    }

    pub async fn mode(&self, tenant_id: &TenantId, server_id: &ServerId) -> IngestMode {
        match self.existing_slot(tenant_id, server_id).await {
            Some(slot) => slot.mode().await,
            None => IngestMode::Idle,
        }
    }

    /// Moves the slot to `to`, recording the transition. No-op when the
    /// slot is already in that mode.
    pub async fn transition(&self, slot: &ServerSlot, to: IngestMode) {
        let from = {
            let mut state = slot.state.lock().await;
            let from = state.mode;
            if from == to {
                return;
            }
            state.mode = to;
            from
        };
        info!(
            tenant_id = %slot.tenant_id,
            server_id = %slot.server_id,
            from = %from,
            to = %to,
            "ingestion mode changed"
        );
        self.record(ModeTransition {
            tenant_id: slot.tenant_id.clone(),
            server_id: slot.server_id.clone(),
            from,
            to,
            at: Utc::now(),
        })
        .await;
    }

    /// Drops the slot, cancelling anything running for the server. The
    /// batch handle is returned so the caller can wait for it to settle.
    pub async fn remove(&self, tenant_id: &TenantId, server_id: &ServerId) -> Option<TaskHandle<BatchSummary>> {
        let slot = self
            .slots
            .lock()
            .await
            .remove(&(tenant_id.clone(), server_id.clone()))?;
        slot.cancel.cancel();
        let batch = slot.take_batch().await;
        if let Some(batch) = &batch {
            batch.cancel();
        }
        self.transition(&slot, IngestMode::Idle).await;
        batch
    }

    pub async fn transitions(&self) -> Vec<ModeTransition> {
        self.transitions.lock().await.iter().cloned().collect()
    }

    pub async fn transitions_for(&self, tenant_id: &TenantId, server_id: &ServerId) -> Vec<ModeTransition> {
        self.transitions
            .lock()
            .await
            .iter()
            .filter(|t| &t.tenant_id == tenant_id && &t.server_id == server_id)
            .cloned()
            .collect()
    }

    pub async fn active_batches(&self) -> Vec<TaskHandle<BatchSummary>> {
        let slots: Vec<Arc<ServerSlot>> = self.slots.lock().await.values().cloned().collect();
        let mut batches = Vec::new();
        for slot in slots {
            if let Some(batch) = slot.batch().await {
                if !batch.is_finished() {
                    batches.push(batch);
                }
            }
        }
        batches
    }

    /// Cancels every slot. Running batches stop at their next record.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    async fn record(&self, transition: ModeTransition) {
        let mut log = self.transitions.lock().await;
        if log.len() >= TRANSITION_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(transition);
    }
}

impl Default for IngestionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
