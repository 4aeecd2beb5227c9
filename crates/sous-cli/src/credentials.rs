//! Bearer credential storage
//!
//! Stores the login token in credentials.json beside the config file with
//! restricted permissions (0o600)

use serde::{Deserialize, Serialize};
use sous_ai::Credential;
use std::fs;
use std::io;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::config::Config;

/// Persisted login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Bearer token issued by the login endpoint
    pub access_token: Credential,
    /// Username the token was issued to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Login timestamp in milliseconds
    pub saved_at: i64,
}

impl StoredCredential {
    pub fn new(access_token: Credential, username: Option<String>) -> Self {
        Self {
            access_token,
            username,
            saved_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Get the credentials file path
pub fn credentials_file() -> PathBuf {
    Config::config_path()
        .parent()
        .map(|dir| dir.to_path_buf())
        .unwrap_or_else(Config::config_dir)
        .join("credentials.json")
}

/// Load the stored login, if any
pub fn load() -> Option<StoredCredential> {
    let path = credentials_file();
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(stored) => Some(stored),
        Err(e) => {
            tracing::warn!("Ignoring unreadable credentials file {}: {}", path.display(), e);
            None
        }
    }
}

/// Save the login
pub fn save(stored: &StoredCredential) -> io::Result<()> {
    let path = credentials_file();
    if let Some(dir) = path.parent().filter(|dir| !dir.exists()) {
        fs::create_dir_all(dir)?;
        #[cfg(unix)]
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }

    let content = serde_json::to_string_pretty(stored)?;
    fs::write(&path, content)?;

    #[cfg(unix)]
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

/// Remove the stored login; a missing file is not an error
pub fn remove() -> io::Result<bool> {
    match fs::remove_file(credentials_file()) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
