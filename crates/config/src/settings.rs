// User settings
//
// Stored as TOML at <config_dir>/semtab/settings.toml. Every field has a
// default, so a partial or missing file is fine.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("could not determine config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend API root, e.g. "http://localhost:3003/api"
    pub api_base: String,

    /// HTTP timeout for backend and service calls
    pub timeout_secs: u64,

    /// `tracing` filter directives (overridden by SEMTAB_LOG)
    pub log_filter: String,

    /// Extra reconciliator/extender definitions, overlaid on the built-ins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:3003/api".to_string(),
            timeout_secs: 60,
            log_filter: "info".to_string(),
            registry_path: None,
        }
    }
}

impl Settings {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Contents of the registry overlay file, if one is configured.
    ///
    /// Relative paths resolve against the settings directory.
    pub fn registry_overlay(&self) -> Result<Option<String>, ConfigError> {
        let Some(path) = &self.registry_path else {
            return Ok(None);
        };
        let path = match (path.is_relative(), settings_path()) {
            (true, Some(settings)) => settings.parent().map(|dir| dir.join(path)).unwrap_or_else(|| path.clone()),
            _ => path.clone(),
        };
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| ConfigError::Read { path, source })
    }
}

/// Get the settings file path
pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("semtab").join("settings.toml"))
}

/// Load settings from the default location. A missing file gives defaults.
pub fn load_settings() -> Result<Settings, ConfigError> {
    match settings_path() {
        Some(path) => load_settings_from(&path),
        None => Ok(Settings::default()),
    }
}

pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(Settings::default());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Settings::from_toml(&contents)
}

/// Save settings to the default location.
pub fn save_settings(settings: &Settings) -> Result<(), ConfigError> {
    let path = settings_path().ok_or(ConfigError::NoConfigDir)?;
    save_settings_to(&path, settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, settings.to_toml()?).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.timeout(), Duration::from_secs(60));
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = Settings::from_toml(
            r#"
            api_base = "https://semtab.example.org/api"
            timeout_secs = 15
            "#,
        )
        .unwrap();
        assert_eq!(settings.api_base, "https://semtab.example.org/api");
        assert_eq!(settings.timeout_secs, 15);
        assert_eq!(settings.log_filter, "info");
        assert!(settings.registry_path.is_none());
    }

    #[test]
    fn wrong_type_is_parse_error() {
        let err = Settings::from_toml("timeout_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn settings_path_under_semtab() {
        if let Some(path) = settings_path() {
            assert!(path.ends_with("semtab/settings.toml"));
        }
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("semtab").join("settings.toml");
        let settings = Settings {
            log_filter: "semtab_enrich=debug,info".into(),
            registry_path: Some(PathBuf::from("/etc/semtab/registry.toml")),
            ..Settings::default()
        };
        save_settings_to(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path).unwrap(), settings);
    }

    #[test]
    fn registry_overlay_reads_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let overlay = dir.path().join("registry.toml");
        fs::write(&overlay, "[reconcilers.wikidata]\nkind = \"lookup\"\n").unwrap();

        let settings = Settings {
            registry_path: Some(overlay),
            ..Settings::default()
        };
        let text = settings.registry_overlay().unwrap().unwrap();
        assert!(text.contains("wikidata"));
        assert_eq!(Settings::default().registry_overlay().unwrap(), None);
    }

    #[test]
    fn missing_overlay_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            registry_path: Some(dir.path().join("nope.toml")),
            ..Settings::default()
        };
        assert!(matches!(settings.registry_overlay(), Err(ConfigError::Read { .. })));
    }
}
