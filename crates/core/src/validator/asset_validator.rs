//! Eligibility filtering over the metadata endpoint.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info};

use crate::auth::Credential;
use crate::metrics::ASSETS_REJECTED;
use crate::platform::{AssetPlatform, AssetRecord, AssetType, MAX_LOOKUP_BATCH};

use super::types::{RejectionReason, ValidationError, Verdict};

/// Metadata lookups allowed in flight at once for one batch.
pub const MAX_CONCURRENT_LOOKUPS: usize = 4;

/// Apply the eligibility rules to one metadata record, in order.
pub fn judge(
    record: &AssetRecord,
    expected_type: AssetType,
    target_creator_id: u64,
    system_creator_id: u64,
) -> Verdict {
    if record.asset_type != expected_type.as_str() {
        return Verdict::Rejected(RejectionReason::WrongType);
    }
    if record.moderated {
        return Verdict::Rejected(RejectionReason::Moderated);
    }
    match record.owner_id {
        Some(owner) if owner == target_creator_id => {
            Verdict::Rejected(RejectionReason::AlreadyOwnedByTarget)
        }
        Some(owner) if owner == system_creator_id => {
            Verdict::Rejected(RejectionReason::OwnedByPlatform)
        }
        _ => Verdict::Eligible,
    }
}

/// Drop repeats, keeping the first occurrence.
pub fn dedup_first_seen(ids: &[u64]) -> Vec<u64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Decides which requested assets may be republished.
pub struct AssetValidator {
    platform: Arc<dyn AssetPlatform>,
}

impl AssetValidator {
    pub fn new(platform: Arc<dyn AssetPlatform>) -> Self {
        Self { platform }
    }

    /// Eligible ids in first-seen order. Never fails: a chunk whose lookup
    /// fails contributes nothing.
    pub async fn validate(
        &self,
        ids: &[u64],
        expected_type: AssetType,
        target_creator_id: u64,
        credential: &Credential,
    ) -> Vec<u64> {
        let ids = dedup_first_seen(ids);
        if ids.is_empty() {
            return Vec::new();
        }

        let lookups: Vec<_> = ids
            .chunks(MAX_LOOKUP_BATCH)
            .map(|chunk| self.validate_chunk(chunk, expected_type, target_creator_id, credential))
            .collect();
        let results: Vec<_> = stream::iter(lookups)
            .buffered(MAX_CONCURRENT_LOOKUPS)
            .collect()
            .await;

        let mut eligible = Vec::new();
        for result in results {
            match result {
                Ok(chunk_eligible) => eligible.extend(chunk_eligible),
                Err(e) => error!(error = %e, "Skipping chunk that could not be validated"),
            }
        }

        debug!(
            requested = ids.len(),
            eligible = eligible.len(),
            "Validation complete"
        );
        eligible
    }

    async fn validate_chunk(
        &self,
        chunk: &[u64],
        expected_type: AssetType,
        target_creator_id: u64,
        credential: &Credential,
    ) -> Result<Vec<u64>, ValidationError> {
        let records = self
            .platform
            .lookup_assets(chunk, credential)
            .await
            .map_err(|source| ValidationError::Lookup {
                count: chunk.len(),
                source,
            })?;

        let system_creator_id = self.platform.system_creator_id();
        let mut verdicts: HashMap<u64, Verdict> = HashMap::with_capacity(records.len());
        for record in &records {
            verdicts
                .entry(record.id)
                .or_insert_with(|| judge(record, expected_type, target_creator_id, system_creator_id));
        }

        let mut eligible = Vec::with_capacity(chunk.len());
        for id in chunk {
            match verdicts.get(id) {
                Some(Verdict::Eligible) => eligible.push(*id),
                Some(Verdict::Rejected(reason)) => {
                    info!(asset_id = id, reason = %reason, "Asset excluded");
                    ASSETS_REJECTED.with_label_values(&[reason.as_str()]).inc();
                }
                None => debug!(asset_id = id, "No metadata returned for asset"),
            }
        }
        Ok(eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlatform;
    use crate::transport::TransportError;

    fn record(id: u64, asset_type: &str, owner: u64) -> AssetRecord {
        AssetRecord {
            id,
            asset_type: asset_type.to_string(),
            moderated: false,
            owner_id: Some(owner),
        }
    }

    #[test]
    fn test_judge_rule_order() {
        let mut r = record(1, "Audio", 9);
        r.moderated = true;
        // Type is checked before moderation
        assert_eq!(
            judge(&r, AssetType::Animation, 9, 1),
            Verdict::Rejected(RejectionReason::WrongType)
        );
        assert_eq!(
            judge(&r, AssetType::Audio, 9, 1),
            Verdict::Rejected(RejectionReason::Moderated)
        );

        let owned = record(2, "Audio", 9);
        assert_eq!(
            judge(&owned, AssetType::Audio, 9, 1),
            Verdict::Rejected(RejectionReason::AlreadyOwnedByTarget)
        );

        let system = record(3, "Audio", 1);
        assert_eq!(
            judge(&system, AssetType::Audio, 9, 1),
            Verdict::Rejected(RejectionReason::OwnedByPlatform)
        );

        let fine = record(4, "Audio", 55);
        assert!(judge(&fine, AssetType::Audio, 9, 1).is_eligible());
    }

    #[test]
    fn test_judge_unknown_owner_is_eligible() {
        let r = AssetRecord {
            id: 1,
            asset_type: "Animation".to_string(),
            moderated: false,
            owner_id: None,
        };
        assert!(judge(&r, AssetType::Animation, 9, 1).is_eligible());
    }

    #[test]
    fn test_dedup_first_seen() {
        assert_eq!(dedup_first_seen(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
        assert!(dedup_first_seen(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_validate_filters_owned_asset() {
        let platform = Arc::new(
            MockPlatform::new()
                .with_record(record(111, "Audio", 50))
                .with_record(record(222, "Audio", 9)),
        );
        let validator = AssetValidator::new(platform);

        let eligible = validator
            .validate(&[111, 222], AssetType::Audio, 9, &Credential::new("c"))
            .await;
        assert_eq!(eligible, vec![111]);
    }

    #[tokio::test]
    async fn test_validate_chunks_by_fifty_and_keeps_order() {
        let mut platform = MockPlatform::new();
        for id in 1..=120u64 {
            platform = platform.with_record(record(id, "Animation", 500));
        }
        let platform = Arc::new(platform);
        let validator = AssetValidator::new(platform.clone());

        let ids: Vec<u64> = (1..=120).rev().collect();
        let eligible = validator
            .validate(&ids, AssetType::Animation, 9, &Credential::new("c"))
            .await;

        assert_eq!(eligible, ids);
        let lookups = platform.recorded_lookups().await;
        assert_eq!(lookups.len(), 3);
        assert!(lookups.iter().all(|chunk| chunk.len() <= MAX_LOOKUP_BATCH));
    }

    #[tokio::test]
    async fn test_lookup_fan_out_is_capped() {
        let mut platform = MockPlatform::new();
        for id in 1..=1000u64 {
            platform = platform.with_record(record(id, "Audio", 500));
        }
        let platform = Arc::new(platform);
        let validator = AssetValidator::new(platform.clone());

        let ids: Vec<u64> = (1..=1000).collect();
        let eligible = validator
            .validate(&ids, AssetType::Audio, 9, &Credential::new("c"))
            .await;

        assert_eq!(eligible, ids);
        assert_eq!(platform.recorded_lookups().await.len(), 20);
        assert_eq!(platform.max_lookups_in_flight(), MAX_CONCURRENT_LOOKUPS);
    }

    #[tokio::test]
    async fn test_failed_chunk_degrades_to_empty() {
        let mut platform = MockPlatform::new();
        for id in 1..=60u64 {
            platform = platform.with_record(record(id, "Audio", 500));
        }
        // 55 lands in the second chunk
        let platform = Arc::new(platform.with_lookup_failure(55, TransportError::Timeout));
        let validator = AssetValidator::new(platform);

        let ids: Vec<u64> = (1..=60).collect();
        let eligible = validator
            .validate(&ids, AssetType::Audio, 9, &Credential::new("c"))
            .await;
        assert_eq!(eligible, (1..=50).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_unrequested_and_duplicate_records_ignored() {
        let platform = Arc::new(
            MockPlatform::new()
                .with_record(record(5, "Audio", 500))
                .with_extra_record(record(999, "Audio", 500)),
        );
        let validator = AssetValidator::new(platform);

        let eligible = validator
            .validate(&[5, 5, 6], AssetType::Audio, 9, &Credential::new("c"))
            .await;
        assert_eq!(eligible, vec![5]);
    }
}
