//! Domain types shared by the platform client, validator, and pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::transport::TransportError;

/// Kinds of asset that can be republished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AssetType {
    Animation,
    Audio,
}

impl AssetType {
    /// Name the platform uses for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Animation => "Animation",
            AssetType::Audio => "Audio",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Animation" => Ok(AssetType::Animation),
            "Audio" => Ok(AssetType::Audio),
            other => Err(format!("Unknown asset type: {}", other)),
        }
    }
}

/// Metadata for one asset as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub id: u64,
    /// Type name as reported; may be a type this tool does not handle.
    pub asset_type: String,
    pub moderated: bool,
    /// Creator id of the current owner, when reported.
    pub owner_id: Option<u64>,
}

/// One desired republication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetJob {
    pub old_id: u64,
    pub asset_type: AssetType,
    /// User or group that will own the new asset.
    pub creator_id: u64,
    pub is_group_target: bool,
}

/// Per-asset failure inside a batch.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to fetch asset payload: {0}")]
    Fetch(#[source] TransportError),

    #[error("Failed to publish asset: {0}")]
    Upload(#[source] TransportError),

    #[error("Publish returned an unrecognised asset id: {0:?}")]
    InvalidAssetId(String),
}

impl PublishError {
    /// Stage label for metrics and logs.
    pub fn stage(&self) -> &'static str {
        match self {
            PublishError::Fetch(_) => "fetch",
            PublishError::Upload(_) | PublishError::InvalidAssetId(_) => "publish",
        }
    }
}
