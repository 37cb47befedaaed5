use async_trait::async_trait;
use thiserror::Error;

use super::types::{AuthenticatedUser, Credential, SecurityToken};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No credential available: {0}")]
    MissingCredential(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Security token handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Security token handshake was accepted (HTTP {0}); refusing to trust it")]
    HandshakeAccepted(u16),

    #[error("Authentication service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Owns the long-lived credential and derives security tokens from it.
#[async_trait]
pub trait Session: Send + Sync {
    /// Resolve the current credential. Re-read on every call.
    async fn credential(&self) -> Result<Credential, AuthError>;

    /// Obtain a fresh security token. No retry of its own.
    async fn security_token(&self, credential: &Credential) -> Result<SecurityToken, AuthError>;

    /// Look up the account the credential belongs to.
    async fn authenticated_user(
        &self,
        credential: &Credential,
    ) -> Result<AuthenticatedUser, AuthError>;
}
