use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::platform::{AssetJob, AssetType};

/// One client-submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub asset_type: AssetType,
    /// User or group that will own the republished assets.
    pub creator_id: u64,
    pub is_group_target: bool,
    pub asset_ids: Vec<u64>,
}

impl BatchRequest {
    pub fn job(&self, old_id: u64) -> AssetJob {
        AssetJob {
            old_id,
            asset_type: self.asset_type,
            creator_id: self.creator_id,
            is_group_target: self.is_group_target,
        }
    }
}

/// Summary of a settled batch, for logs.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub requested: usize,
    pub eligible: usize,
    pub published: usize,
    pub failed_ids: Vec<u64>,
    /// Set when the batch stopped before any job ran.
    pub aborted: Option<String>,
}

impl BatchReport {
    pub(crate) fn start(requested: usize) -> Self {
        let now = Utc::now();
        Self {
            batch_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            requested,
            eligible: 0,
            published: 0,
            failed_ids: Vec::new(),
            aborted: None,
        }
    }

    pub fn failed(&self) -> usize {
        self.failed_ids.len()
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}
