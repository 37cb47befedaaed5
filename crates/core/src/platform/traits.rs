use async_trait::async_trait;

use crate::auth::{AuthError, AuthenticatedUser, Credential, SecurityToken};
use crate::transport::TransportError;

use super::types::{AssetJob, AssetRecord, PublishError};

/// Most ids the metadata endpoint accepts per call.
pub const MAX_LOOKUP_BATCH: usize = 50;

/// Remote platform operations the pipeline depends on.
#[async_trait]
pub trait AssetPlatform: Send + Sync {
    /// Creator id under which the platform owns its own assets.
    fn system_creator_id(&self) -> u64;

    /// Look up the account a credential belongs to.
    async fn authenticated_user(
        &self,
        credential: &Credential,
    ) -> Result<AuthenticatedUser, AuthError>;

    /// Harvest a security token from a request the platform is expected to reject.
    ///
    /// An accepted request is an error: the token cannot be trusted.
    async fn handshake(&self, credential: &Credential) -> Result<SecurityToken, AuthError>;

    /// Fetch metadata for at most [`MAX_LOOKUP_BATCH`] ids.
    async fn lookup_assets(
        &self,
        ids: &[u64],
        credential: &Credential,
    ) -> Result<Vec<AssetRecord>, TransportError>;

    /// Download an asset's binary payload.
    async fn fetch_asset(&self, id: u64, credential: &Credential) -> Result<Vec<u8>, PublishError>;

    /// Publish a payload as a new asset and return its id.
    async fn publish_asset(
        &self,
        job: &AssetJob,
        payload: Vec<u8>,
        credential: &Credential,
        token: &SecurityToken,
    ) -> Result<u64, PublishError>;
}
