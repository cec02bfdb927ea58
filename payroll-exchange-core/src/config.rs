//! Import options and the exchange configuration file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ExchangeError, Result};

/// What to do with a node whose remote counterpart already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateMode {
    /// Leave existing objects untouched.
    Ignore,
    /// Overwrite existing objects with the document's fields.
    #[default]
    Update,
}

/// How lookups are imported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataImportMode {
    /// Per lookup and per value upsert.
    #[default]
    Single,
    /// Delete and recreate whole lookups in one batch call.
    Bulk,
}

/// Options fixed for one import run.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    pub update_mode: UpdateMode,
    pub data_import_mode: DataImportMode,
    /// Fetch existing counterparts before upserting. When off every node is created.
    pub load_targets: bool,
    /// Drop file references once their content has been inlined.
    pub clear_file_references: bool,
    /// Remember resolved references for the rest of the run.
    pub cache_references: bool,
    /// Creation date for nodes without one; falls back to the document's.
    pub created_object_date: Option<DateTime<Utc>>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            update_mode: UpdateMode::Update,
            data_import_mode: DataImportMode::Single,
            load_targets: true,
            clear_file_references: false,
            cache_references: false,
            created_object_date: None,
        }
    }
}

/// Exchange configuration stored as `pex.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExchangeConfig {
    /// Base URL of the remote REST API.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    pub update_mode: UpdateMode,
    pub data_import_mode: DataImportMode,
    pub clear_file_references: bool,
    pub cache_references: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:44354/api".to_string(),
            timeout_secs: 300,
            update_mode: UpdateMode::Update,
            data_import_mode: DataImportMode::Single,
            clear_file_references: false,
            cache_references: false,
        }
    }
}

impl ExchangeConfig {
    pub const FILE_NAME: &'static str = "pex.json";

    /// Load the configuration from `dir`, falling back to defaults.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::file_path(dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path).map_err(|e| ExchangeError::File {
            path: path.display().to_string(),
            message: "failed to read configuration".to_string(),
            source: Some(e),
        })?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save the configuration into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = Self::file_path(dir);
        let tmp_path = path.with_extension("tmp");
        let data = serde_json::to_string_pretty(self)?;
        let io_error = |e: std::io::Error| ExchangeError::File {
            path: path.display().to_string(),
            message: "failed to write configuration".to_string(),
            source: Some(e),
        };
        fs::write(&tmp_path, &data).map_err(io_error)?;
        fs::rename(&tmp_path, &path).map_err(io_error)?;
        Ok(())
    }

    /// Options for an import run driven by this configuration.
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            update_mode: self.update_mode,
            data_import_mode: self.data_import_mode,
            clear_file_references: self.clear_file_references,
            cache_references: self.cache_references,
            ..ImportOptions::default()
        }
    }

    fn file_path(dir: &Path) -> PathBuf {
        dir.join(Self::FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_load_missing_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = ExchangeConfig::load(tmp.path()).unwrap();
        assert_eq!(config, ExchangeConfig::default());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let config = ExchangeConfig {
            base_url: "https://payroll.example.com/api".into(),
            update_mode: UpdateMode::Ignore,
            data_import_mode: DataImportMode::Bulk,
            ..Default::default()
        };
        config.save(tmp.path()).unwrap();
        assert!(tmp.path().join("pex.json").exists());

        let loaded = ExchangeConfig::load(tmp.path()).unwrap();
        assert_eq!(loaded, config);

        let options = loaded.import_options();
        assert_eq!(options.update_mode, UpdateMode::Ignore);
        assert_eq!(options.data_import_mode, DataImportMode::Bulk);
        assert!(options.load_targets);
    }

    #[test]
    fn test_config_partial_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("pex.json"), r#"{"updateMode":"Ignore"}"#).unwrap();
        let config = ExchangeConfig::load(tmp.path()).unwrap();
        assert_eq!(config.update_mode, UpdateMode::Ignore);
        assert_eq!(config.timeout_secs, 300);
    }
}
