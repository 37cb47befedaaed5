//! Testing utilities and mock implementations.
//!
//! Mocks for the platform and session traits, so the pipeline and the HTTP
//! layer can be exercised without network access or a credential file.
//!
//! # Example
//!
//! ```rust,ignore
//! use reuploader_core::testing::{fixtures, MockPlatform, MockSession};
//!
//! let platform = Arc::new(MockPlatform::new().with_record(fixtures::asset_record(111, "Audio", 50)));
//! let session = Arc::new(MockSession::new());
//!
//! // Build a PublishPipeline from them...
//! ```

mod mock_platform;
mod mock_session;

pub use mock_platform::{MockPlatform, RecordedPublish};
pub use mock_session::MockSession;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::platform::AssetRecord;

    /// An unmoderated asset of `asset_type` owned by `owner_id`.
    pub fn asset_record(id: u64, asset_type: &str, owner_id: u64) -> AssetRecord {
        AssetRecord {
            id,
            asset_type: asset_type.to_string(),
            moderated: false,
            owner_id: Some(owner_id),
        }
    }

    /// A moderated asset of `asset_type` owned by `owner_id`.
    pub fn moderated_record(id: u64, asset_type: &str, owner_id: u64) -> AssetRecord {
        AssetRecord {
            moderated: true,
            ..asset_record(id, asset_type, owner_id)
        }
    }
}
