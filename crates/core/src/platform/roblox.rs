//! Platform client over the retrying transport.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::auth::{AuthError, AuthenticatedUser, Credential, SecurityToken};
use crate::config::PlatformConfig;
use crate::transport::{RequestSpec, RetryingTransport, TransportError};

use super::{AssetJob, AssetPlatform, AssetRecord, PublishError, MAX_LOOKUP_BATCH};

/// Header the platform returns the security token in.
pub const SECURITY_TOKEN_HEADER: &str = "x-csrf-token";

/// Live platform client.
pub struct RobloxPlatform {
    config: PlatformConfig,
    transport: RetryingTransport,
    /// Single-attempt transport for the credential calls.
    auth_transport: RetryingTransport,
}

impl RobloxPlatform {
    pub fn new(config: PlatformConfig, transport: RetryingTransport) -> Self {
        let auth_transport = transport.without_retry();
        Self {
            config,
            transport,
            auth_transport,
        }
    }

    /// Attach the credential and client identification headers.
    fn authed(&self, spec: RequestSpec, credential: &Credential) -> RequestSpec {
        let spec = spec
            .header("Cookie", credential.cookie_header())
            .header("User-Agent", self.config.user_agent.clone());
        match credential.api_key() {
            Some(key) => spec.header("Authorization", format!("Bearer {}", key)),
            None => spec,
        }
    }

    fn lookup_url(&self, ids: &[u64]) -> String {
        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/v1/assets?assetIds={}",
            self.config.develop_url.trim_end_matches('/'),
            joined
        )
    }

    fn fetch_url(&self, id: u64) -> String {
        format!(
            "{}/v1/asset/?id={}",
            self.config.asset_delivery_url.trim_end_matches('/'),
            id
        )
    }

    fn publish_url(&self, job: &AssetJob) -> String {
        let type_name = urlencoding::encode(job.asset_type.as_str());
        let mut url = format!(
            "{}/ide/publish/uploadnewanimation?assetTypeName={}&name={}&description=&AllID=1&ispublic=false&allowComments=false&isGamesAsset=false",
            self.config.publish_url.trim_end_matches('/'),
            type_name,
            type_name,
        );
        if job.is_group_target {
            url.push_str(&format!("&groupId={}", job.creator_id));
        }
        url
    }
}

#[async_trait]
impl AssetPlatform for RobloxPlatform {
    fn system_creator_id(&self) -> u64 {
        self.config.system_creator_id
    }

    async fn authenticated_user(
        &self,
        credential: &Credential,
    ) -> Result<AuthenticatedUser, AuthError> {
        let url = format!(
            "{}/v1/users/authenticated",
            self.config.users_url.trim_end_matches('/')
        );
        let spec = self.authed(RequestSpec::get(url), credential);

        let response = self
            .auth_transport
            .request(&spec)
            .await
            .map_err(|e| match e {
                TransportError::Rejected { status: 401, .. } => {
                    AuthError::InvalidCredential("Credential was rejected".to_string())
                }
                other => AuthError::ServiceUnavailable(other.to_string()),
            })?;

        response
            .json::<AuthenticatedUser>()
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))
    }

    async fn handshake(&self, credential: &Credential) -> Result<SecurityToken, AuthError> {
        let url = format!("{}/v2/logout", self.config.auth_url.trim_end_matches('/'));
        // Sent without a token on purpose: the 403 is what carries one.
        let spec = self
            .authed(RequestSpec::post(url), credential)
            .accept_status(403);

        let response = self
            .auth_transport
            .request(&spec)
            .await
            .map_err(|e| match e {
                TransportError::Rejected { status: 401, .. } => {
                    AuthError::InvalidCredential("Credential was rejected".to_string())
                }
                other => AuthError::ServiceUnavailable(other.to_string()),
            })?;

        if response.is_success() {
            return Err(AuthError::HandshakeAccepted(response.status));
        }

        let token = response
            .header(SECURITY_TOKEN_HEADER)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AuthError::HandshakeFailed(format!(
                    "HTTP {} response carried no {} header",
                    response.status, SECURITY_TOKEN_HEADER
                ))
            })?;

        debug!("Obtained security token");
        Ok(SecurityToken::new(token))
    }

    async fn lookup_assets(
        &self,
        ids: &[u64],
        credential: &Credential,
    ) -> Result<Vec<AssetRecord>, TransportError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > MAX_LOOKUP_BATCH {
            return Err(TransportError::InvalidRequest(format!(
                "{} ids exceeds lookup limit of {}",
                ids.len(),
                MAX_LOOKUP_BATCH
            )));
        }

        let spec = self.authed(RequestSpec::get(self.lookup_url(ids)), credential);
        let response = self.transport.request(&spec).await?;
        let body: LookupResponse = response.json()?;

        Ok(body.data.into_vec().into_iter().map(Into::into).collect())
    }

    async fn fetch_asset(&self, id: u64, credential: &Credential) -> Result<Vec<u8>, PublishError> {
        let spec = self.authed(RequestSpec::get(self.fetch_url(id)), credential);
        let response = self
            .transport
            .request(&spec)
            .await
            .map_err(PublishError::Fetch)?;

        if response.body.is_empty() {
            return Err(PublishError::Fetch(TransportError::Malformed(
                "empty asset payload".to_string(),
            )));
        }
        Ok(response.body)
    }

    async fn publish_asset(
        &self,
        job: &AssetJob,
        payload: Vec<u8>,
        credential: &Credential,
        token: &SecurityToken,
    ) -> Result<u64, PublishError> {
        let spec = self
            .authed(RequestSpec::post(self.publish_url(job)), credential)
            .header("Content-Type", "application/xml")
            .header(SECURITY_TOKEN_HEADER, token.as_str())
            .body(payload);

        let response = self
            .transport
            .request(&spec)
            .await
            .map_err(PublishError::Upload)?;

        let text = response.text().map_err(PublishError::Upload)?;
        parse_asset_id(text)
    }
}

/// The publish endpoint answers with the bare new id.
fn parse_asset_id(text: &str) -> Result<u64, PublishError> {
    let trimmed = text.trim();
    match trimmed.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(PublishError::InvalidAssetId(
            trimmed.chars().take(100).collect(),
        )),
    }
}

// Metadata API response types
#[derive(Debug, Deserialize)]
struct LookupResponse {
    data: OneOrMany<WireAsset>,
}

/// The endpoint returns a bare object instead of a list for a single id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAsset {
    id: u64,
    #[serde(rename = "type")]
    asset_type: String,
    #[serde(default)]
    is_moderated: bool,
    #[serde(default)]
    creator: Option<WireCreator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCreator {
    #[serde(default)]
    target_id: Option<u64>,
}

impl From<WireAsset> for AssetRecord {
    fn from(asset: WireAsset) -> Self {
        AssetRecord {
            id: asset.id,
            asset_type: asset.asset_type,
            moderated: asset.is_moderated,
            owner_id: asset.creator.and_then(|c| c.target_id),
        }
    }
}
