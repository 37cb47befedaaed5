//! Mock platform for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, Semaphore};

use crate::auth::{AuthError, AuthenticatedUser, Credential, SecurityToken};
use crate::platform::{AssetJob, AssetPlatform, AssetRecord, PublishError};
use crate::transport::TransportError;

/// Offset added to an old id to produce the id the mock publishes it under.
const NEW_ID_OFFSET: u64 = 1_000_000;

/// A recorded publish for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedPublish {
    pub job: AssetJob,
    pub payload: Vec<u8>,
    pub token: String,
}

/// Mock implementation of the AssetPlatform trait.
///
/// Behaviour is configured with builder methods before the mock is shared;
/// calls are recorded for later assertions.
///
/// # Example
///
/// ```rust,ignore
/// use reuploader_core::testing::{fixtures, MockPlatform};
///
/// let platform = MockPlatform::new()
///     .with_record(fixtures::asset_record(111, "Audio", 50))
///     .with_fetch_failure(222, TransportError::Timeout);
///
/// // ... run a batch ...
///
/// assert_eq!(platform.recorded_fetches().await, vec![111]);
/// ```
pub struct MockPlatform {
    records: HashMap<u64, AssetRecord>,
    /// Returned from every lookup regardless of the ids asked for.
    extra_records: Vec<AssetRecord>,
    lookup_failures: HashMap<u64, TransportError>,
    fetch_failures: HashMap<u64, TransportError>,
    publish_failures: HashMap<u64, TransportError>,
    token: String,
    handshake_error: Option<String>,
    rejected_secrets: HashSet<String>,
    user: AuthenticatedUser,
    /// Publishes each issued token is good for, when limited.
    token_lifetime: Option<usize>,
    token_uses: AtomicUsize,
    /// When set, each fetch waits for a permit.
    gate: Option<Arc<Semaphore>>,
    call_delay: Duration,
    /// Assets between the start of their fetch and the end of their publish.
    in_flight: Mutex<HashSet<u64>>,
    peak_in_flight: AtomicUsize,
    lookups_in_flight: AtomicUsize,
    peak_lookups_in_flight: AtomicUsize,
    handshakes: AtomicUsize,
    lookups: Arc<RwLock<Vec<Vec<u64>>>>,
    fetches: Arc<RwLock<Vec<u64>>>,
    publishes: Arc<RwLock<Vec<RecordedPublish>>>,
}

impl std::fmt::Debug for MockPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPlatform")
            .field("records", &self.records.len())
            .field("token", &"<token>")
            .field("gate", &self.gate.is_some())
            .field("lookups", &"<lookups>")
            .field("fetches", &"<fetches>")
            .field("publishes", &"<publishes>")
            .finish()
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// Create a mock with no assets that answers every handshake.
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            extra_records: Vec::new(),
            lookup_failures: HashMap::new(),
            fetch_failures: HashMap::new(),
            publish_failures: HashMap::new(),
            token: "mock-token".to_string(),
            handshake_error: None,
            rejected_secrets: HashSet::new(),
            user: AuthenticatedUser {
                id: 4242,
                name: "mock-user".to_string(),
                display_name: "Mock User".to_string(),
            },
            token_lifetime: None,
            token_uses: AtomicUsize::new(0),
            gate: None,
            call_delay: Duration::from_millis(2),
            in_flight: Mutex::new(HashSet::new()),
            peak_in_flight: AtomicUsize::new(0),
            lookups_in_flight: AtomicUsize::new(0),
            peak_lookups_in_flight: AtomicUsize::new(0),
            handshakes: AtomicUsize::new(0),
            lookups: Arc::new(RwLock::new(Vec::new())),
            fetches: Arc::new(RwLock::new(Vec::new())),
            publishes: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Id the mock assigns when republishing `old_id`.
    pub fn new_id_for(old_id: u64) -> u64 {
        old_id + NEW_ID_OFFSET
    }

    /// Add an asset to the metadata the mock reports.
    pub fn with_record(mut self, record: AssetRecord) -> Self {
        self.records.insert(record.id, record);
        self
    }

    /// Add a record that is returned even when nobody asked for it.
    pub fn with_extra_record(mut self, record: AssetRecord) -> Self {
        self.extra_records.push(record);
        self
    }

    /// Fail any lookup whose chunk contains `id`.
    pub fn with_lookup_failure(mut self, id: u64, error: TransportError) -> Self {
        self.lookup_failures.insert(id, error);
        self
    }

    pub fn with_fetch_failure(mut self, id: u64, error: TransportError) -> Self {
        self.fetch_failures.insert(id, error);
        self
    }

    pub fn with_publish_failure(mut self, id: u64, error: TransportError) -> Self {
        self.publish_failures.insert(id, error);
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = token.to_string();
        self
    }

    /// Make every handshake fail with `message`.
    pub fn with_handshake_error(mut self, message: &str) -> Self {
        self.handshake_error = Some(message.to_string());
        self
    }

    /// Treat `secret` as a credential the platform does not recognise.
    pub fn with_rejected_secret(mut self, secret: &str) -> Self {
        self.rejected_secrets.insert(secret.to_string());
        self
    }

    pub fn with_user(mut self, user: AuthenticatedUser) -> Self {
        self.user = user;
        self
    }

    /// Hold every fetch until [`release`](Self::release) hands out permits.
    pub fn held(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `n` held fetches proceed.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Let every current and future fetch proceed.
    pub fn release_all(&self) {
        if let Some(gate) = &self.gate {
            // Waiters on a closed semaphore return immediately.
            gate.close();
        }
    }

    /// Expire each issued token after `publishes` accepted publishes.
    ///
    /// Publishes with an expired or superseded token are rejected with 403,
    /// and every handshake after the first issues a new token.
    pub fn with_token_lifetime(mut self, publishes: usize) -> Self {
        self.token_lifetime = Some(publishes);
        self
    }

    /// Token handed out by the `n`th handshake.
    pub fn token_for(&self, n: usize) -> String {
        if n <= 1 {
            self.token.clone()
        } else {
            format!("{}-{}", self.token, n)
        }
    }

    /// Most assets observed between fetch start and publish end at once.
    pub fn max_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Most metadata lookups observed running at the same time.
    pub fn max_lookups_in_flight(&self) -> usize {
        self.peak_lookups_in_flight.load(Ordering::SeqCst)
    }

    pub async fn handshake_count(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    /// Get recorded lookups, one entry per chunk.
    pub async fn recorded_lookups(&self) -> Vec<Vec<u64>> {
        self.lookups.read().await.clone()
    }

    /// Get recorded fetches, in call order.
    pub async fn recorded_fetches(&self) -> Vec<u64> {
        self.fetches.read().await.clone()
    }

    pub async fn recorded_publishes(&self) -> Vec<RecordedPublish> {
        self.publishes.read().await.clone()
    }

    async fn enter(&self, id: u64) {
        let mut active = self.in_flight.lock().await;
        active.insert(id);
        self.peak_in_flight.fetch_max(active.len(), Ordering::SeqCst);
    }

    async fn leave(&self, id: u64) {
        self.in_flight.lock().await.remove(&id);
    }

    fn accept_token(&self, token: &SecurityToken) -> Result<(), TransportError> {
        let Some(lifetime) = self.token_lifetime else {
            return Ok(());
        };
        let current = self.token_for(self.handshakes.load(Ordering::SeqCst));
        if token.as_str() != current {
            return Err(TransportError::from_status(403, "Token Validation Failed"));
        }
        if self.token_uses.fetch_add(1, Ordering::SeqCst) >= lifetime {
            return Err(TransportError::from_status(403, "Token Validation Failed"));
        }
        Ok(())
    }

    fn check_credential(&self, credential: &Credential) -> Result<(), AuthError> {
        if self.rejected_secrets.contains(credential.secret()) {
            return Err(AuthError::InvalidCredential(
                "Credential was rejected".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AssetPlatform for MockPlatform {
    fn system_creator_id(&self) -> u64 {
        1
    }

    async fn authenticated_user(
        &self,
        credential: &Credential,
    ) -> Result<AuthenticatedUser, AuthError> {
        self.check_credential(credential)?;
        Ok(self.user.clone())
    }

    async fn handshake(&self, credential: &Credential) -> Result<SecurityToken, AuthError> {
        let n = self.handshakes.fetch_add(1, Ordering::SeqCst) + 1;
        self.check_credential(credential)?;
        if let Some(message) = &self.handshake_error {
            return Err(AuthError::HandshakeFailed(message.clone()));
        }
        self.token_uses.store(0, Ordering::SeqCst);
        Ok(SecurityToken::new(self.token_for(n)))
    }

    async fn lookup_assets(
        &self,
        ids: &[u64],
        _credential: &Credential,
    ) -> Result<Vec<AssetRecord>, TransportError> {
        self.lookups.write().await.push(ids.to_vec());

        let now = self.lookups_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_lookups_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.call_delay).await;
        self.lookups_in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = ids.iter().find_map(|id| self.lookup_failures.get(id)) {
            return Err(error.clone());
        }

        let mut records: Vec<AssetRecord> = ids
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect();
        records.extend(self.extra_records.iter().cloned());
        Ok(records)
    }

    async fn fetch_asset(&self, id: u64, _credential: &Credential) -> Result<Vec<u8>, PublishError> {
        self.fetches.write().await.push(id);
        self.enter(id).await;

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        tokio::time::sleep(self.call_delay).await;

        if let Some(error) = self.fetch_failures.get(&id) {
            self.leave(id).await;
            return Err(PublishError::Fetch(error.clone()));
        }
        Ok(format!("payload-{}", id).into_bytes())
    }

    async fn publish_asset(
        &self,
        job: &AssetJob,
        payload: Vec<u8>,
        _credential: &Credential,
        token: &SecurityToken,
    ) -> Result<u64, PublishError> {
        self.publishes.write().await.push(RecordedPublish {
            job: *job,
            payload,
            token: token.as_str().to_string(),
        });
        self.enter(job.old_id).await;
        tokio::time::sleep(self.call_delay).await;

        let result = match self.publish_failures.get(&job.old_id) {
            Some(error) => Err(PublishError::Upload(error.clone())),
            None => self
                .accept_token(token)
                .map(|_| Self::new_id_for(job.old_id))
                .map_err(PublishError::Upload),
        };
        self.leave(job.old_id).await;
        result
    }
}
