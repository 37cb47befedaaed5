//! Asset eligibility checks.

mod asset_validator;
mod types;

pub use asset_validator::{dedup_first_seen, judge, AssetValidator, MAX_CONCURRENT_LOOKUPS};
pub use types::*;
