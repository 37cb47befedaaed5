//! Batch state and completed mappings, shared between the running batch and
//! the poll handler.
//!
//! Everything lives behind one mutex so a poll always sees the ledger and
//! the status from the same instant.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Lifecycle of the single active batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchStatus {
    Idle,
    Running,
    Done,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("A batch is already in progress")]
    BatchInProgress,
}

/// What one poll hands back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResponse {
    /// No batch has been submitted, or the last one was fully delivered.
    Idle,
    /// Running with nothing new to report.
    Uploading,
    /// Mappings completed since the previous poll, old id to new id.
    Completed(BTreeMap<String, String>),
    /// Every mapping has been delivered. Sent once.
    Done,
}

#[derive(Debug)]
struct TrackerState {
    status: BatchStatus,
    completed: BTreeMap<String, String>,
}

/// Owner of the batch status flag and the completion ledger.
#[derive(Debug)]
pub struct BatchTracker {
    state: Mutex<TrackerState>,
}

impl Default for BatchTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState {
                status: BatchStatus::Idle,
                completed: BTreeMap::new(),
            }),
        }
    }

    /// Claim the tracker for a new batch.
    ///
    /// Refused while a batch runs, and while a finished batch still has
    /// results the client has not collected.
    pub async fn try_begin(&self) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        if state.status != BatchStatus::Idle {
            return Err(LedgerError::BatchInProgress);
        }
        state.status = BatchStatus::Running;
        state.completed.clear();
        Ok(())
    }

    /// Record a completed mapping. Returns false if `old_id` was already
    /// recorded in this batch; the first value is kept.
    pub async fn record(&self, old_id: u64, new_id: u64) -> bool {
        let mut state = self.state.lock().await;
        let key = old_id.to_string();
        if state.completed.contains_key(&key) {
            debug!(asset_id = old_id, "Ignoring duplicate completion");
            return false;
        }
        state.completed.insert(key, new_id.to_string());
        true
    }

    /// Mark the running batch as settled.
    pub async fn finish(&self) {
        let mut state = self.state.lock().await;
        if state.status == BatchStatus::Running {
            state.status = BatchStatus::Done;
        }
    }

    /// Drain pending mappings, or report the status when there are none.
    ///
    /// Mappings are returned even after the batch is Done; the "Done" reply
    /// comes on the first poll that finds the ledger empty, and resets the
    /// tracker to Idle.
    pub async fn poll(&self) -> PollResponse {
        let mut state = self.state.lock().await;
        if !state.completed.is_empty() {
            return PollResponse::Completed(std::mem::take(&mut state.completed));
        }
        match state.status {
            BatchStatus::Idle => PollResponse::Idle,
            BatchStatus::Running => PollResponse::Uploading,
            BatchStatus::Done => {
                state.status = BatchStatus::Idle;
                PollResponse::Done
            }
        }
    }

    pub async fn status(&self) -> BatchStatus {
        self.state.lock().await.status
    }

    /// Whether a new batch would currently be refused.
    pub async fn is_busy(&self) -> bool {
        self.status().await != BatchStatus::Idle
    }
}
