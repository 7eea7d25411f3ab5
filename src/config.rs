use std::{env, path::PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const DATA_DIR_ENV: &str = "JOBTRACK_DATA_DIR";
pub const ARTIFACT_EXT_ENV: &str = "JOBTRACK_ARTIFACT_EXT";
pub const MAX_NAME_ATTEMPTS_ENV: &str = "JOBTRACK_MAX_NAME_ATTEMPTS";

const DEFAULT_DATA_DIR: &str = ".jobtrack";
const DEFAULT_VAULT_FILE: &str = "handles.sqlite3";
const DEFAULT_META_FILE: &str = "binding_meta.json";
const DEFAULT_ARTIFACT_EXTENSION: &str = "txt";
const DEFAULT_MAX_NAME_ATTEMPTS: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the handle vault and the binding metadata file.
    pub data_dir: PathBuf,
    pub vault_file_name: String,
    pub meta_file_name: String,
    /// Extension of exported artifacts, without the leading dot.
    pub artifact_extension: String,
    /// Upper bound on `base`, `base_1`, ... candidates tried per export.
    pub max_name_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            vault_file_name: DEFAULT_VAULT_FILE.to_string(),
            meta_file_name: DEFAULT_META_FILE.to_string(),
            artifact_extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
            max_name_attempts: DEFAULT_MAX_NAME_ATTEMPTS,
        }
    }
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `JOBTRACK_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir.trim());
        }
        if let Some(ext) = lookup(ARTIFACT_EXT_ENV) {
            config.artifact_extension = ext;
        }
        if let Some(raw) = lookup(MAX_NAME_ATTEMPTS_ENV) {
            config.max_name_attempts = raw.trim().parse().with_context(|| {
                format!("{MAX_NAME_ATTEMPTS_ENV} must be a positive integer, got {raw:?}")
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_name_attempts == 0 {
            bail!("max_name_attempts must be at least 1");
        }
        let ext = self.extension();
        if ext.is_empty() {
            bail!("artifact extension must not be empty");
        }
        if ext.contains(['/', '\\', '.']) {
            bail!("artifact extension {ext:?} must be a single plain suffix");
        }
        Ok(())
    }

    /// Artifact extension with surrounding whitespace and a leading dot removed.
    pub fn extension(&self) -> &str {
        let ext = self.artifact_extension.trim();
        ext.strip_prefix('.').unwrap_or(ext)
    }

    pub fn vault_path(&self) -> PathBuf {
        self.data_dir.join(&self.vault_file_name)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.data_dir.join(&self.meta_file_name)
    }
}
