mod session;
mod traits;
mod types;

pub use session::PlatformSession;
pub use traits::*;
pub use types::*;
