//! Persisted credential storage.

mod store;

pub use store::{CredentialStore, API_KEY_KEY, SECRET_KEY};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential file not found: {0}")]
    FileNotFound(String),

    #[error("Credential file has no usable {0}")]
    MissingKey(String),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Credential file I/O error: {0}")]
    Io(#[from] std::io::Error),
}
