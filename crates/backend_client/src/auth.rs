//! Token storage.
//!
//! Reads/writes `<config_dir>/semtab/auth.json` (0600 on Unix). Obtaining
//! the token is out of scope; whoever logs in writes this file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use semtab_enrich::TokenProvider;

use crate::error::ClientError;

/// Authentication credentials stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCredentials {
    /// Bearer token for the backend API
    pub token: String,
    /// API base URL (e.g. "http://localhost:3003/api")
    pub api_base: String,
    /// Username (for display)
    #[serde(default)]
    pub username: Option<String>,
}

impl AuthCredentials {
    pub fn new(token: String, api_base: String) -> Self {
        Self {
            token,
            api_base,
            username: None,
        }
    }
}

impl TokenProvider for AuthCredentials {
    fn auth_header(&self) -> Option<String> {
        if self.token.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", self.token))
        }
    }
}

/// Returns the path to the auth credentials file.
pub fn auth_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("semtab").join("auth.json"))
}

/// Load saved credentials. `None` if nothing is saved or the file is invalid.
pub fn load_auth() -> Option<AuthCredentials> {
    load_auth_from(&auth_file_path()?)
}

pub fn load_auth_from(path: &Path) -> Option<AuthCredentials> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(creds) => Some(creds),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable auth file");
            None
        }
    }
}

/// Save credentials to the default location.
pub fn save_auth(creds: &AuthCredentials) -> Result<(), ClientError> {
    let path = auth_file_path().ok_or_else(|| ClientError::Io("could not determine config directory".into()))?;
    save_auth_to(&path, creds)
}

/// Save credentials, creating the parent directory. Sets 0600 on Unix.
pub fn save_auth_to(path: &Path, creds: &AuthCredentials) -> Result<(), ClientError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ClientError::Io(format!("failed to create config directory: {e}")))?;
    }

    let contents =
        serde_json::to_string_pretty(creds).map_err(|e| ClientError::Parse(format!("failed to serialize credentials: {e}")))?;

    std::fs::write(path, contents).map_err(|e| ClientError::Io(format!("failed to write auth file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions)
            .map_err(|e| ClientError::Io(format!("failed to set file permissions: {e}")))?;
    }

    Ok(())
}

/// Delete saved credentials.
pub fn delete_auth() -> Result<(), ClientError> {
    let Some(path) = auth_file_path() else {
        return Ok(());
    };
    if path.exists() {
        std::fs::remove_file(&path).map_err(|e| ClientError::Io(format!("failed to delete auth file: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_username_defaults() {
        let json = r#"{"token":"tok","api_base":"http://localhost:3003/api"}"#;
        let parsed: AuthCredentials = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.token, "tok");
        assert!(parsed.username.is_none());
    }

    #[test]
    fn bearer_header() {
        let creds = AuthCredentials::new("tok".into(), "http://x".into());
        assert_eq!(creds.auth_header().as_deref(), Some("Bearer tok"));
        let anon = AuthCredentials::new(String::new(), "http://x".into());
        assert_eq!(anon.auth_header(), None);
    }

    #[test]
    fn auth_file_under_semtab() {
        let path = auth_file_path().unwrap();
        assert!(path.ends_with("semtab/auth.json"));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("auth.json");
        let creds = AuthCredentials {
            token: "tok123".into(),
            api_base: "http://api.test".into(),
            username: Some("ada".into()),
        };
        save_auth_to(&path, &creds).unwrap();
        assert_eq!(load_auth_from(&path), Some(creds));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(load_auth_from(&path), None);
    }
}
