use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)
}

/// The studio plugin connects to this port.
fn default_port() -> u16 {
    5544
}

/// Where the long-lived credential is persisted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_credentials_path")]
    pub path: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: default_credentials_path(),
        }
    }
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from(".env")
}

/// Remote platform endpoints.
///
/// Base URLs are overridable so tests can point the client at a local server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformConfig {
    /// Authenticated-user lookup host.
    #[serde(default = "default_users_url")]
    pub users_url: String,
    /// Auth host, used for the security token handshake.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Asset metadata host.
    #[serde(default = "default_develop_url")]
    pub develop_url: String,
    /// Asset payload host.
    #[serde(default = "default_asset_delivery_url")]
    pub asset_delivery_url: String,
    /// Publish host.
    #[serde(default = "default_publish_url")]
    pub publish_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Creator id the platform itself owns assets under.
    #[serde(default = "default_system_creator_id")]
    pub system_creator_id: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            users_url: default_users_url(),
            auth_url: default_auth_url(),
            develop_url: default_develop_url(),
            asset_delivery_url: default_asset_delivery_url(),
            publish_url: default_publish_url(),
            user_agent: default_user_agent(),
            system_creator_id: default_system_creator_id(),
        }
    }
}

impl PlatformConfig {
    /// Point every endpoint at a single base URL.
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            users_url: base.clone(),
            auth_url: base.clone(),
            develop_url: base.clone(),
            asset_delivery_url: base.clone(),
            publish_url: base,
            ..Self::default()
        }
    }
}

fn default_users_url() -> String {
    "https://users.roblox.com".to_string()
}

fn default_auth_url() -> String {
    "https://auth.roblox.com".to_string()
}

fn default_develop_url() -> String {
    "https://develop.roblox.com".to_string()
}

fn default_asset_delivery_url() -> String {
    "https://assetdelivery.roblox.com".to_string()
}

fn default_publish_url() -> String {
    "https://www.roblox.com".to_string()
}

fn default_user_agent() -> String {
    "Roblox/Linux".to_string()
}

fn default_system_creator_id() -> u64 {
    1
}

/// Outbound request policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Per-request timeout in seconds (default: 10)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Total attempts per request, first try included (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay before each retry in milliseconds (default: 500)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    500
}

/// Batch pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Asset jobs allowed in flight at once. Fixed for the process lifetime.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

fn default_max_concurrent_jobs() -> usize {
    5
}
