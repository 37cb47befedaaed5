//! Key-value credential file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::auth::Credential;

use super::CredentialError;

/// Key holding the long-lived secret.
pub const SECRET_KEY: &str = "ROBLOSECURITY_COOKIE";

/// Key holding the optional API key.
pub const API_KEY_KEY: &str = "API_KEY";

const SECRET_PLACEHOLDER: &str = "your-roblox-cookie";
const API_KEY_PLACEHOLDER: &str = "your-roblox-api-key";

const TEMPLATE: &str = "# Credentials used by the reuploader\n\
ROBLOSECURITY_COOKIE=your-roblox-cookie\n\
API_KEY=your-roblox-api-key\n";

/// File-backed credential store (`KEY=VALUE` lines).
///
/// Read on every [`load`](Self::load) so a credential written by another
/// process is picked up without a restart.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the placeholder template if no file exists yet.
    ///
    /// Returns `true` when a file was created.
    pub fn ensure_template(&self) -> Result<bool, CredentialError> {
        if self.path.exists() {
            return Ok(false);
        }
        fs::write(&self.path, TEMPLATE)?;
        info!(path = %self.path.display(), "Created credential file template");
        Ok(true)
    }

    /// Load the credential. Placeholder values count as absent.
    pub fn load(&self) -> Result<Credential, CredentialError> {
        let values = self.read_values()?;

        let secret = values
            .get(SECRET_KEY)
            .filter(|v| !v.is_empty() && v.as_str() != SECRET_PLACEHOLDER)
            .ok_or_else(|| CredentialError::MissingKey(SECRET_KEY.to_string()))?;

        let mut credential = Credential::new(secret.clone());
        if let Some(api_key) = values
            .get(API_KEY_KEY)
            .filter(|v| !v.is_empty() && v.as_str() != API_KEY_PLACEHOLDER)
        {
            credential = credential.with_api_key(api_key.clone());
        }

        debug!(fingerprint = %credential.fingerprint(), "Loaded credential");
        Ok(credential)
    }

    /// Persist a new secret, replacing any previous one.
    pub fn save_secret(&self, secret: &str) -> Result<(), CredentialError> {
        self.save_value(SECRET_KEY, secret)
    }

    /// Persist a new API key, replacing any previous one.
    pub fn save_api_key(&self, api_key: &str) -> Result<(), CredentialError> {
        self.save_value(API_KEY_KEY, api_key)
    }

    /// Parse the file into a map. Comments and blank lines are skipped.
    pub fn read_values(&self) -> Result<HashMap<String, String>, CredentialError> {
        if !self.path.exists() {
            return Err(CredentialError::FileNotFound(
                self.path.display().to_string(),
            ));
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content.lines().filter_map(parse_line).collect())
    }

    /// Replace `key` in place, or append it. Other lines are preserved.
    fn save_value(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        if value.contains('\n') {
            return Err(CredentialError::InvalidValue(key.to_string()));
        }

        let existing = if self.path.exists() {
            fs::read_to_string(&self.path)?
        } else {
            String::new()
        };

        let mut replaced = false;
        let mut lines: Vec<String> = existing
            .lines()
            .map(|line| match parse_line(line) {
                Some((k, _)) if k == key => {
                    replaced = true;
                    format!("{}={}", key, value)
                }
                _ => line.to_string(),
            })
            .collect();

        if !replaced {
            lines.push(format!("{}={}", key, value));
        }

        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(&self.path, content)?;

        info!(key = key, path = %self.path.display(), "Saved credential value");
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    Some((key.trim().to_string(), value.to_string()))
}
