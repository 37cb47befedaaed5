//! Session backed by the credential file and the live platform.

use std::sync::Arc;

use async_trait::async_trait;

use crate::credentials::{CredentialError, CredentialStore};
use crate::platform::AssetPlatform;

use super::traits::{AuthError, Session};
use super::types::{AuthenticatedUser, Credential, SecurityToken};

/// Reads the credential from disk on every call so an edited file takes
/// effect on the next batch without a restart.
pub struct PlatformSession {
    store: CredentialStore,
    platform: Arc<dyn AssetPlatform>,
}

impl PlatformSession {
    pub fn new(store: CredentialStore, platform: Arc<dyn AssetPlatform>) -> Self {
        Self { store, platform }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }
}

impl From<CredentialError> for AuthError {
    fn from(e: CredentialError) -> Self {
        AuthError::MissingCredential(e.to_string())
    }
}

#[async_trait]
impl Session for PlatformSession {
    async fn credential(&self) -> Result<Credential, AuthError> {
        Ok(self.store.load()?)
    }

    async fn security_token(&self, credential: &Credential) -> Result<SecurityToken, AuthError> {
        self.platform.handshake(credential).await
    }

    async fn authenticated_user(
        &self,
        credential: &Credential,
    ) -> Result<AuthenticatedUser, AuthError> {
        self.platform.authenticated_user(credential).await
    }
}
