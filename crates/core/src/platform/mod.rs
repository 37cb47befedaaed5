//! Remote asset platform boundary.
//!
//! [`AssetPlatform`] is the seam between the pipeline and the network. The
//! live implementation is [`RobloxPlatform`]; tests use
//! `testing::MockPlatform`.

mod roblox;
mod traits;
mod types;

pub use roblox::{RobloxPlatform, SECURITY_TOKEN_HEADER};
pub use traits::{AssetPlatform, MAX_LOOKUP_BATCH};
pub use types::*;
