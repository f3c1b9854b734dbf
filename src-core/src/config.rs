//! Application Configuration
//!
//! Loaded from `haremdb.json` in the data root. Every field has a default, so
//! a missing file (or a partial one) is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, DomainResult};

pub const CONFIG_FILE: &str = "haremdb.json";
pub const DEFAULT_DB_FILE: &str = "harem.db";
pub const DEFAULT_AUTOSAVE_MS: u64 = 5000;

/// How cards and mods are brought into the library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSettings {
    /// Copy source files (true) or move them (false)
    #[serde(default = "default_true")]
    pub is_copy_file: bool,
    /// Game install directory; mods are skipped when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_root: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            is_copy_file: true,
            game_root: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Managed asset root
    #[serde(default)]
    pub data_root: PathBuf,
    #[serde(default = "default_db_file")]
    pub db_file: String,
    #[serde(default = "default_autosave_ms")]
    pub autosave_interval_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub settings: ImportSettings,
}

fn default_db_file() -> String {
    DEFAULT_DB_FILE.to_string()
}

fn default_autosave_ms() -> u64 {
    DEFAULT_AUTOSAVE_MS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_root(PathBuf::new())
    }
}

impl AppConfig {
    pub fn with_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            db_file: default_db_file(),
            autosave_interval_ms: DEFAULT_AUTOSAVE_MS,
            log_dir: None,
            settings: ImportSettings::default(),
        }
    }

    /// Read `config_file`, or `<data_root>/haremdb.json` when none is given
    ///
    /// A missing file yields defaults. An empty `dataRoot` in the file is
    /// replaced by `data_root`.
    pub fn load(data_root: &Path, config_file: Option<&Path>) -> DomainResult<Self> {
        let path = config_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join(CONFIG_FILE));

        let mut config = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<AppConfig>(&bytes).map_err(|e| {
                DomainError::InvalidInput(format!("malformed config {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };

        if config.data_root.as_os_str().is_empty() {
            config.data_root = data_root.to_path_buf();
        }
        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_root.join(&self.db_file)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.data_root.join("logs"))
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path(), None).unwrap();

        assert_eq!(config.data_root, dir.path());
        assert_eq!(config.db_path(), dir.path().join("harem.db"));
        assert_eq!(config.autosave_interval(), Duration::from_secs(5));
        assert_eq!(config.log_dir(), dir.path().join("logs"));
        assert!(config.settings.is_copy_file);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"autosaveIntervalMs": 250, "settings": {"isCopyFile": false, "gameRoot": "/games/hs2"}}"#,
        )
        .unwrap();

        let config = AppConfig::load(dir.path(), None).unwrap();
        assert_eq!(config.autosave_interval_ms, 250);
        assert_eq!(config.db_file, "harem.db");
        assert!(!config.settings.is_copy_file);
        assert_eq!(config.settings.game_root, Some(PathBuf::from("/games/hs2")));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = AppConfig::load(dir.path(), Some(&path)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }
}
