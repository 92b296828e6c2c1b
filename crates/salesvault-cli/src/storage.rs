use std::{fs, path::PathBuf, sync::Arc};

use crate::config::Config;
use color_eyre::Result;
use dirs::data_dir;
use salesvault_core::{CsvOptions, Encoding, Table};
use salesvault_etl::EncryptedDatasetLoader;
use salesvault_storage::{
    EnvKeyProvider, KeyProvider, KeyStore, SecureDataManager, StaticKeyProvider,
};
use tracing::debug;

/// Resolve the default data directory for salesvault.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("salesvault"))
}

/// The process key: `encryption_key` from config, else the environment.
///
/// The hex text is moved out of `config` into a provider that zeroizes it on drop,
/// so this is meant to be called once per run.
pub fn key_from_config(config: &mut Config) -> Result<Arc<KeyStore>> {
    let key = match config.encryption_key.take() {
        Some(encoded) => {
            debug!("using encryption key from config file");
            StaticKeyProvider::new(encoded).load()?
        }
        None => {
            debug!(var = EnvKeyProvider::DEFAULT_VAR, "using encryption key from environment");
            EnvKeyProvider::default().load()?
        }
    };
    Ok(Arc::new(key))
}

/// Build the manager for the configured directories.
pub fn manager_from_config(config: &mut Config) -> Result<SecureDataManager> {
    let key = key_from_config(config)?;
    let encrypted_dir = config.encrypted_dir()?;
    debug!(?encrypted_dir, "initializing secure data manager");
    let manager = SecureDataManager::new(key, encrypted_dir);
    Ok(match &config.scratch_dir {
        Some(dir) => manager.with_scratch_dir(dir),
        None => manager,
    })
}

pub fn loader_from_config(config: &mut Config) -> Result<EncryptedDatasetLoader<SecureDataManager>> {
    let manager = manager_from_config(config)?;
    let encrypted_dir = manager.encrypted_dir().to_path_buf();
    Ok(EncryptedDatasetLoader::new(manager, encrypted_dir, config.dataset.clone()))
}

/// Encrypt a small export with `key` and load it back through a scratch file.
pub fn probe(key: Arc<KeyStore>) -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw = dir.path().join("raw");
    fs::create_dir_all(&raw)?;
    fs::write(raw.join("probe.csv"), "id;value\n1;ok\n")?;

    let probe = SecureDataManager::new(key, dir.path().join("encrypted"))
        .with_scratch_dir(dir.path().join("scratch"));
    let written = probe.encrypt_all(&raw, "probe.csv")?;
    let blob = written
        .first()
        .ok_or_else(|| color_eyre::eyre::eyre!("probe file was not encrypted"))?;

    let options = CsvOptions::default()
        .with_encoding(Encoding::Utf8)
        .with_skip_rows(0);
    let table = probe.load_table(blob, &options)?;

    let mut expected = Table::new(vec!["id".into(), "value".into()]);
    expected
        .push_row(vec![Some("1".into()), Some("ok".into())])
        .map_err(|_| color_eyre::eyre::eyre!("probe row does not fit"))?;
    if table != expected {
        color_eyre::eyre::bail!("encrypt/decrypt round-trip failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(root: &std::path::Path, key: &KeyStore) -> Config {
        Config {
            encryption_key: Some(key.to_hex()),
            encrypted_dir: Some(root.join("encrypted")),
            scratch_dir: Some(root.join("scratch")),
            ..Config::default()
        }
    }

    #[test]
    fn probe_round_trips_with_configured_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = config_with_key(dir.path(), &KeyStore::generate());
        let key = key_from_config(&mut cfg).expect("key");
        probe(key).expect("probe should succeed");
    }

    #[test]
    fn configured_key_text_does_not_outlive_loading() {
        let dir = tempfile::tempdir().expect("tempdir");
        let original = KeyStore::generate();
        let mut cfg = config_with_key(dir.path(), &original);

        let key = key_from_config(&mut cfg).expect("key");
        assert_eq!(key.to_hex(), original.to_hex());
        assert_eq!(cfg.encryption_key, None);
    }

    #[test]
    fn invalid_configured_key_is_rejected() {
        let mut cfg = Config {
            encryption_key: Some("not-a-key".into()),
            ..Config::default()
        };
        let err = key_from_config(&mut cfg).expect_err("short key");
        assert!(err.to_string().contains("64 hex characters"));
    }

    #[test]
    fn loader_resolves_blobs_in_encrypted_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = config_with_key(dir.path(), &KeyStore::generate());
        let loader = loader_from_config(&mut cfg).expect("loader");
        assert_eq!(
            loader.path_for("Enero"),
            dir.path().join("encrypted").join("enero.enc")
        );
    }
}
