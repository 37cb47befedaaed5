pub mod auth;
pub mod config;
pub mod credentials;
pub mod ledger;
pub mod metrics;
pub mod pipeline;
pub mod platform;
pub mod scheduler;
pub mod testing;
pub mod transport;
pub mod validator;

pub use auth::{AuthError, AuthenticatedUser, Credential, PlatformSession, SecurityToken, Session};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
};
pub use credentials::{CredentialError, CredentialStore};
pub use ledger::{BatchStatus, BatchTracker, LedgerError, PollResponse};
pub use pipeline::{BatchReport, BatchRequest, PublishPipeline};
pub use platform::{AssetJob, AssetPlatform, AssetRecord, AssetType, PublishError, RobloxPlatform};
pub use scheduler::{run_limited, UnitError, UnitOutcome};
pub use transport::{RequestSpec, Response, RetryPolicy, RetryingTransport, TransportError};
pub use validator::{AssetValidator, RejectionReason, ValidationError, Verdict};
