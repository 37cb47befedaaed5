//! Mock session for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::auth::{AuthError, AuthenticatedUser, Credential, SecurityToken, Session};

/// Mock implementation of the Session trait.
///
/// Hands out a fixed credential and token without touching disk or network.
#[derive(Debug)]
pub struct MockSession {
    credential: Option<Credential>,
    token: String,
    token_error: Option<String>,
    /// Token requests that succeed before the rest fail.
    token_budget: Option<usize>,
    token_requests: AtomicUsize,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            credential: Some(Credential::new("mock-secret")),
            token: "session-token".to_string(),
            token_error: None,
            token_budget: None,
            token_requests: AtomicUsize::new(0),
        }
    }

    /// A session whose credential file has nothing usable in it.
    pub fn without_credential() -> Self {
        Self {
            credential: None,
            ..Self::new()
        }
    }

    /// Make every token request fail with `message`.
    pub fn with_token_error(mut self, message: &str) -> Self {
        self.token_error = Some(message.to_string());
        self
    }

    /// Let the first `n` token requests succeed and fail the rest.
    pub fn with_token_budget(mut self, n: usize) -> Self {
        self.token_budget = Some(n);
        self
    }

    pub fn token_value(&self) -> String {
        self.token.clone()
    }

    /// Number of tokens requested so far.
    pub async fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for MockSession {
    async fn credential(&self) -> Result<Credential, AuthError> {
        self.credential
            .clone()
            .ok_or_else(|| AuthError::MissingCredential("mock session has no credential".to_string()))
    }

    async fn security_token(&self, _credential: &Credential) -> Result<SecurityToken, AuthError> {
        let n = self.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(message) = &self.token_error {
            return Err(AuthError::HandshakeFailed(message.clone()));
        }
        match self.token_budget {
            Some(budget) if n > budget => Err(AuthError::ServiceUnavailable(
                "mock session token budget spent".to_string(),
            )),
            _ => Ok(SecurityToken::new(self.token.clone())),
        }
    }

    async fn authenticated_user(
        &self,
        _credential: &Credential,
    ) -> Result<AuthenticatedUser, AuthError> {
        Ok(AuthenticatedUser {
            id: 4242,
            name: "mock-user".to_string(),
            display_name: "Mock User".to_string(),
        })
    }
}
