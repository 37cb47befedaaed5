use std::fmt;

use thiserror::Error;

use crate::transport::TransportError;

/// Why an asset was excluded from a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    WrongType,
    Moderated,
    AlreadyOwnedByTarget,
    OwnedByPlatform,
}

impl RejectionReason {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::WrongType => "wrong_type",
            RejectionReason::Moderated => "moderated",
            RejectionReason::AlreadyOwnedByTarget => "owned_by_target",
            RejectionReason::OwnedByPlatform => "owned_by_platform",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    Rejected(RejectionReason),
}

impl Verdict {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Verdict::Eligible)
    }
}

/// A metadata chunk that could not be checked.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Metadata lookup failed for {count} ids: {source}")]
    Lookup {
        count: usize,
        #[source]
        source: TransportError,
    },
}
