use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use salesvault_etl::DatasetLayout;
use serde::{Deserialize, Serialize};

use crate::storage::default_data_dir;

/// User-level configuration loaded from `~/.config/salesvault/config.toml` (platform-specific).
#[derive(Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// 64 hex characters. Falls back to `SALESVAULT_ENCRYPTION_KEY` when absent.
    pub encryption_key: Option<String>,
    /// Plaintext exports picked up by `encrypt`.
    pub source_dir: Option<PathBuf>,
    /// Where `.enc` blobs are written and loaded from.
    pub encrypted_dir: Option<PathBuf>,
    /// Where ephemeral plaintext lives during a load. Defaults to the OS temp dir.
    pub scratch_dir: Option<PathBuf>,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_level: Option<String>,
    pub dataset: DatasetLayout,
}

impl Config {
    pub fn source_dir(&self) -> Result<PathBuf> {
        match &self.source_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(default_data_dir()?.join("raw")),
        }
    }

    pub fn encrypted_dir(&self) -> Result<PathBuf> {
        match &self.encrypted_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(default_data_dir()?.join("encrypted")),
        }
    }

    /// Config written by `config init`: resolved directories, no key.
    pub fn template() -> Result<Self> {
        let base = default_data_dir()?;
        Ok(Self {
            encryption_key: None,
            source_dir: Some(base.join("raw")),
            encrypted_dir: Some(base.join("encrypted")),
            scratch_dir: None,
            log_level: Some("info".to_string()),
            dataset: DatasetLayout::default(),
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("source_dir", &self.source_dir)
            .field("encrypted_dir", &self.encrypted_dir)
            .field("scratch_dir", &self.scratch_dir)
            .field("log_level", &self.log_level)
            .field("dataset", &self.dataset)
            .finish()
    }
}

/// Load config from `path`, or the default location when `None`; if missing, return defaults.
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_from_path(path),
        None => load_from_path(default_path()?),
    }
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)
        .map_err(|e| color_eyre::eyre::eyre!("invalid config {}: {e}", path.display()))?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("salesvault").join("config.toml"))
}

/// Write `config` to `path`, creating parent directories as needed.
/// An existing file is left untouched so user edits are never clobbered.
pub fn write_default_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
