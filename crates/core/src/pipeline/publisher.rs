//! Batch orchestration: validate, then fetch and republish each eligible asset.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthError, Credential, SecurityToken, Session};
use crate::config::PipelineConfig;
use crate::ledger::BatchTracker;
use crate::metrics::{ASSETS_FAILED, ASSETS_PUBLISHED, BATCHES_STARTED, BATCH_DURATION};
use crate::platform::{AssetJob, AssetPlatform, PublishError};
use crate::scheduler::{run_limited, UnitError};
use crate::transport::TransportError;
use crate::validator::{dedup_first_seen, AssetValidator};

use super::types::{BatchReport, BatchRequest};

/// Runs batches end to end.
pub struct PublishPipeline {
    session: Arc<dyn Session>,
    platform: Arc<dyn AssetPlatform>,
    validator: AssetValidator,
    max_concurrent_jobs: usize,
}

impl PublishPipeline {
    pub fn new(
        session: Arc<dyn Session>,
        platform: Arc<dyn AssetPlatform>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            session,
            validator: AssetValidator::new(Arc::clone(&platform)),
            platform,
            max_concurrent_jobs: config.max_concurrent_jobs.max(1),
        }
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    /// Process one batch and mark it Done in `tracker`.
    ///
    /// The caller must already have claimed the tracker with
    /// [`BatchTracker::try_begin`]. Successful mappings are recorded as they
    /// complete so polls observe progress.
    pub async fn publish_batch(&self, request: BatchRequest, tracker: Arc<BatchTracker>) -> BatchReport {
        let ids = dedup_first_seen(&request.asset_ids);
        let mut report = BatchReport::start(ids.len());
        BATCHES_STARTED.inc();

        info!(
            batch_id = %report.batch_id,
            asset_type = %request.asset_type,
            creator_id = request.creator_id,
            is_group = request.is_group_target,
            requested = ids.len(),
            "Batch started"
        );

        if let Err(e) = self.run(&request, &ids, &tracker, &mut report).await {
            error!(batch_id = %report.batch_id, error = %e, "Batch aborted");
            report.aborted = Some(e.to_string());
        }

        tracker.finish().await;
        report.finished_at = Utc::now();
        BATCH_DURATION.observe(report.duration_secs());

        info!(
            batch_id = %report.batch_id,
            requested = report.requested,
            eligible = report.eligible,
            published = report.published,
            failed = report.failed(),
            failed_ids = ?report.failed_ids,
            "Batch finished"
        );
        report
    }

    async fn run(
        &self,
        request: &BatchRequest,
        ids: &[u64],
        tracker: &Arc<BatchTracker>,
        report: &mut BatchReport,
    ) -> Result<(), AuthError> {
        let credential = self.session.credential().await?;

        let eligible = self
            .validator
            .validate(ids, request.asset_type, request.creator_id, &credential)
            .await;
        report.eligible = eligible.len();
        if eligible.is_empty() {
            info!(batch_id = %report.batch_id, "No eligible assets in batch");
            return Ok(());
        }

        let token = self.session.security_token(&credential).await?;
        let tokens = Arc::new(TokenSlot::new(Arc::clone(&self.session), credential, token));

        let units: Vec<_> = eligible
            .iter()
            .map(|&old_id| {
                let job = request.job(old_id);
                let unit = republish(
                    Arc::clone(&self.platform),
                    Arc::clone(tracker),
                    Arc::clone(&tokens),
                    job,
                );
                (old_id, unit)
            })
            .collect();

        for outcome in run_limited(units, self.max_concurrent_jobs).await {
            match outcome.result {
                Ok(_) => report.published += 1,
                Err(e) => {
                    let stage = match &e {
                        UnitError::Failed(publish_error) => publish_error.stage(),
                        UnitError::Panicked(_) => "panic",
                    };
                    ASSETS_FAILED.with_label_values(&[stage]).inc();
                    warn!(
                        batch_id = %report.batch_id,
                        asset_id = outcome.key,
                        stage,
                        error = %e,
                        "Asset was not republished"
                    );
                    report.failed_ids.push(outcome.key);
                }
            }
        }
        Ok(())
    }
}

/// The batch's security token. A token the platform has rejected is
/// replaced once, by whichever unit sees the rejection first.
struct TokenSlot {
    session: Arc<dyn Session>,
    credential: Credential,
    current: RwLock<SecurityToken>,
}

impl TokenSlot {
    fn new(session: Arc<dyn Session>, credential: Credential, token: SecurityToken) -> Self {
        Self {
            session,
            credential,
            current: RwLock::new(token),
        }
    }

    async fn current(&self) -> SecurityToken {
        self.current.read().await.clone()
    }

    /// Swap out `stale` for a fresh token, unless another unit already has.
    async fn refresh(&self, stale: &SecurityToken) -> Result<SecurityToken, AuthError> {
        let mut current = self.current.write().await;
        if *current == *stale {
            *current = self.session.security_token(&self.credential).await?;
        }
        Ok(current.clone())
    }
}

fn token_rejected(result: &Result<u64, PublishError>) -> bool {
    matches!(
        result,
        Err(PublishError::Upload(TransportError::Rejected { status: 403, .. }))
    )
}

/// One unit of work: fetch the payload, publish it, record the mapping.
async fn republish(
    platform: Arc<dyn AssetPlatform>,
    tracker: Arc<BatchTracker>,
    tokens: Arc<TokenSlot>,
    job: AssetJob,
) -> Result<u64, PublishError> {
    let credential = &tokens.credential;

    debug!(asset_id = job.old_id, "Fetching asset");
    let payload = platform.fetch_asset(job.old_id, credential).await?;

    debug!(asset_id = job.old_id, bytes = payload.len(), "Publishing asset");
    let token = tokens.current().await;
    let mut result = platform
        .publish_asset(&job, payload.clone(), credential, &token)
        .await;

    // A rejected token is retried once with a fresh one
    if token_rejected(&result) {
        warn!(asset_id = job.old_id, "Security token rejected, requesting a new one");
        match tokens.refresh(&token).await {
            Ok(fresh) => {
                result = platform
                    .publish_asset(&job, payload, credential, &fresh)
                    .await;
            }
            Err(e) => warn!(asset_id = job.old_id, error = %e, "Could not refresh security token"),
        }
    }
    let new_id = result?;

    tracker.record(job.old_id, new_id).await;
    ASSETS_PUBLISHED.inc();
    info!(asset_id = job.old_id, new_asset_id = new_id, "Asset republished");
    Ok(new_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PollResponse;
    use crate::platform::{AssetRecord, AssetType};
    use crate::auth::PlatformSession;
    use crate::credentials::CredentialStore;
    use crate::testing::{MockPlatform, MockSession};
    use tempfile::TempDir;
    use crate::transport::TransportError;
    use std::collections::BTreeMap;

    fn record(id: u64, asset_type: &str, owner: u64) -> AssetRecord {
        AssetRecord {
            id,
            asset_type: asset_type.to_string(),
            moderated: false,
            owner_id: Some(owner),
        }
    }

    fn request(asset_type: AssetType, ids: Vec<u64>) -> BatchRequest {
        BatchRequest {
            asset_type,
            creator_id: 9,
            is_group_target: false,
            asset_ids: ids,
        }
    }

    fn pipeline(platform: Arc<MockPlatform>, session: Arc<dyn Session>, limit: usize) -> PublishPipeline {
        PublishPipeline::new(
            session,
            platform,
            &PipelineConfig {
                max_concurrent_jobs: limit,
            },
        )
    }

    async fn begun() -> Arc<BatchTracker> {
        let tracker = Arc::new(BatchTracker::new());
        tracker.try_begin().await.unwrap();
        tracker
    }

    /// Drain every mapping the tracker will hand out, up to and including Done.
    async fn drain(tracker: &BatchTracker) -> BTreeMap<String, String> {
        let mut all = BTreeMap::new();
        loop {
            match tracker.poll().await {
                PollResponse::Completed(batch) => all.extend(batch),
                PollResponse::Done => return all,
                other => panic!("unexpected poll response {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_owned_asset_excluded_from_ledger() {
        let platform = Arc::new(
            MockPlatform::new()
                .with_record(record(111, "Audio", 50))
                .with_record(record(222, "Audio", 9)),
        );
        let tracker = begun().await;

        let report = pipeline(platform.clone(), Arc::new(MockSession::new()), 5)
            .publish_batch(request(AssetType::Audio, vec![111, 222]), Arc::clone(&tracker))
            .await;

        let ledger = drain(&tracker).await;
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("111"), Some(&MockPlatform::new_id_for(111).to_string()));
        assert_eq!(report.eligible, 1);
        assert_eq!(report.published, 1);
        assert!(report.failed_ids.is_empty());
        assert_eq!(platform.recorded_fetches().await, vec![111]);
    }

    #[tokio::test]
    async fn test_failed_units_do_not_block_others() {
        let mut platform = MockPlatform::new();
        for id in 1..=6u64 {
            platform = platform.with_record(record(id, "Animation", 50));
        }
        let platform = Arc::new(
            platform
                .with_fetch_failure(2, TransportError::Timeout)
                .with_publish_failure(5, TransportError::from_status(400, "bad")),
        );
        let tracker = begun().await;

        let report = pipeline(platform, Arc::new(MockSession::new()), 2)
            .publish_batch(request(AssetType::Animation, (1..=6).collect()), Arc::clone(&tracker))
            .await;

        let ledger = drain(&tracker).await;
        let keys: Vec<&str> = ledger.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["1", "3", "4", "6"]);
        assert_eq!(report.published, 4);
        let mut failed = report.failed_ids.clone();
        failed.sort_unstable();
        assert_eq!(failed, vec![2, 5]);
    }

    #[tokio::test]
    async fn test_one_token_per_batch_and_concurrency_bounded() {
        let mut platform = MockPlatform::new();
        for id in 1..=12u64 {
            platform = platform.with_record(record(id, "Audio", 50));
        }
        let platform = Arc::new(platform);
        let session = Arc::new(MockSession::new());
        let tracker = begun().await;

        pipeline(platform.clone(), session.clone(), 3)
            .publish_batch(request(AssetType::Audio, (1..=12).collect()), Arc::clone(&tracker))
            .await;

        assert_eq!(session.token_requests().await, 1);
        // Counted from fetch start to publish end
        assert_eq!(platform.max_in_flight(), 3);
        let publishes = platform.recorded_publishes().await;
        assert_eq!(publishes.len(), 12);
        assert!(publishes.iter().all(|p| p.token == session.token_value()));
    }

    #[tokio::test]
    async fn test_handshake_failure_finishes_with_empty_ledger() {
        let platform = Arc::new(MockPlatform::new().with_record(record(1, "Audio", 50)));
        let session = Arc::new(MockSession::new().with_token_error("no token"));
        let tracker = begun().await;

        let report = pipeline(platform.clone(), session, 5)
            .publish_batch(request(AssetType::Audio, vec![1]), Arc::clone(&tracker))
            .await;

        assert!(report.aborted.is_some());
        assert_eq!(report.published, 0);
        assert!(platform.recorded_fetches().await.is_empty());
        assert_eq!(tracker.poll().await, PollResponse::Done);
    }

    #[tokio::test]
    async fn test_missing_credential_aborts_before_validation() {
        let platform = Arc::new(MockPlatform::new().with_record(record(1, "Audio", 50)));
        let session = Arc::new(MockSession::without_credential());
        let tracker = begun().await;

        let report = pipeline(platform.clone(), session, 5)
            .publish_batch(request(AssetType::Audio, vec![1]), Arc::clone(&tracker))
            .await;

        assert!(report.aborted.is_some());
        assert!(platform.recorded_lookups().await.is_empty());
        assert_eq!(tracker.poll().await, PollResponse::Done);
    }

    #[tokio::test]
    async fn test_no_eligible_assets_skips_handshake() {
        let platform = Arc::new(MockPlatform::new().with_record(record(1, "Animation", 50)));
        let session = Arc::new(MockSession::new());
        let tracker = begun().await;

        let report = pipeline(platform, session.clone(), 5)
            .publish_batch(request(AssetType::Audio, vec![1]), Arc::clone(&tracker))
            .await;

        assert_eq!(report.eligible, 0);
        assert!(report.aborted.is_none());
        assert_eq!(session.token_requests().await, 0);
        assert_eq!(tracker.poll().await, PollResponse::Done);
    }

    #[tokio::test]
    async fn test_duplicate_input_ids_published_once() {
        let platform = Arc::new(MockPlatform::new().with_record(record(7, "Audio", 50)));
        let tracker = begun().await;

        let report = pipeline(platform.clone(), Arc::new(MockSession::new()), 5)
            .publish_batch(request(AssetType::Audio, vec![7, 7, 7]), Arc::clone(&tracker))
            .await;

        assert_eq!(report.requested, 1);
        assert_eq!(platform.recorded_publishes().await.len(), 1);
        assert_eq!(drain(&tracker).await.len(), 1);
    }

    fn platform_session(platform: Arc<MockPlatform>, dir: &TempDir) -> Arc<PlatformSession> {
        let path = dir.path().join(".env");
        std::fs::write(&path, "ROBLOSECURITY_COOKIE=abc\n").unwrap();
        Arc::new(PlatformSession::new(CredentialStore::new(path), platform))
    }

    #[tokio::test]
    async fn test_rejected_token_is_refreshed() {
        let mut platform = MockPlatform::new().with_token_lifetime(2);
        for id in 1..=6u64 {
            platform = platform.with_record(record(id, "Audio", 50));
        }
        let platform = Arc::new(platform);
        let dir = TempDir::new().unwrap();
        let session = platform_session(platform.clone(), &dir);
        let tracker = begun().await;

        let report = pipeline(platform.clone(), session, 1)
            .publish_batch(request(AssetType::Audio, (1..=6).collect()), Arc::clone(&tracker))
            .await;

        assert_eq!(report.published, 6);
        assert!(report.failed_ids.is_empty());
        assert_eq!(drain(&tracker).await.len(), 6);
        // One token per two publishes
        assert_eq!(platform.handshake_count().await, 3);

        // Each spent token costs one rejected publish before the refresh
        let publishes = platform.recorded_publishes().await;
        assert_eq!(publishes.len(), 8);
        let uses = |n: usize| {
            let token = platform.token_for(n);
            publishes.iter().filter(|p| p.token == token).count()
        };
        assert_eq!((uses(1), uses(2), uses(3)), (3, 3, 2));
    }

    #[tokio::test]
    async fn test_persistent_rejection_retried_once() {
        let platform = Arc::new(
            MockPlatform::new()
                .with_record(record(1, "Audio", 50))
                .with_record(record(2, "Audio", 50))
                .with_publish_failure(2, TransportError::from_status(403, "denied")),
        );
        let session = Arc::new(MockSession::new());
        let tracker = begun().await;

        let report = pipeline(platform.clone(), session.clone(), 1)
            .publish_batch(request(AssetType::Audio, vec![1, 2]), Arc::clone(&tracker))
            .await;

        assert_eq!(report.published, 1);
        assert_eq!(report.failed_ids, vec![2]);
        assert_eq!(session.token_requests().await, 2);
        let attempts = platform
            .recorded_publishes()
            .await
            .iter()
            .filter(|p| p.job.old_id == 2)
            .count();
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_refresh_failure_fails_only_the_unit() {
        let platform = Arc::new(
            MockPlatform::new()
                .with_record(record(1, "Audio", 50))
                .with_record(record(2, "Audio", 50))
                .with_publish_failure(1, TransportError::from_status(403, "denied")),
        );
        let session = Arc::new(MockSession::new().with_token_budget(1));
        let tracker = begun().await;

        let report = pipeline(platform.clone(), session.clone(), 1)
            .publish_batch(request(AssetType::Audio, vec![1, 2]), Arc::clone(&tracker))
            .await;

        assert!(report.aborted.is_none());
        assert_eq!(report.failed_ids, vec![1]);
        assert_eq!(report.published, 1);
        assert_eq!(session.token_requests().await, 2);
        let ledger = drain(&tracker).await;
        assert_eq!(ledger.keys().collect::<Vec<_>>(), vec!["2"]);
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let p = pipeline(
            Arc::new(MockPlatform::new()),
            Arc::new(MockSession::new()),
            0,
        );
        assert_eq!(p.max_concurrent_jobs(), 1);
    }
}
