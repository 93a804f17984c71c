//! Persisted token state.
//!
//! One JSON file under the configured store directory holds the current
//! grant. The file is chmod 0600 on unix since it contains live
//! credentials.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::{AuthError, Result};

/// Token file name inside the store directory.
const TOKEN_FILE_NAME: &str = "token.json";

/// Seconds before the recorded expiry at which a token already counts
/// as expired, to absorb clock skew and request latency.
const EXPIRY_SKEW_SECS: i64 = 60;

/// An authorization grant as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
}

impl StoredToken {
    /// True when the access token is no longer safe to present.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expiry
    }
}

/// Reads and writes the token file.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Store rooted at the given state directory.
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: store_dir.into().join(TOKEN_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The persisted token, or `None` when no grant has been stored yet.
    pub fn load(&self) -> Result<Option<StoredToken>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AuthError::TokenStore {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Persists the token, creating the store directory if needed.
    pub fn save(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| AuthError::TokenStore {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let raw = serde_json::to_string_pretty(token)?;
        fs::write(&self.path, raw).map_err(|e| AuthError::TokenStore {
            path: self.path.clone(),
            source: e,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                AuthError::TokenStore {
                    path: self.path.clone(),
                    source: e,
                }
            })?;
        }

        Ok(())
    }
}
