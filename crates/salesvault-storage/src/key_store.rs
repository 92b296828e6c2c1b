use std::fmt;

use rand::{rngs::OsRng, RngCore};
use salesvault_core::VaultError;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of an AES-256 key in bytes.
pub const KEY_LEN: usize = 32;
/// Length of the hex encoding accepted from configuration.
pub const KEY_HEX_LEN: usize = KEY_LEN * 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("encryption key must be {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("encryption key is not valid hex: {0}")]
    InvalidHex(String),
    #[error("encryption key not configured: {0}")]
    Missing(String),
}

impl From<KeyError> for VaultError {
    fn from(err: KeyError) -> Self {
        VaultError::cipher(err)
    }
}

/// The single 256-bit key used for every blob.
///
/// Built once at startup and shared read-only (typically behind an `Arc`).
/// Key bytes are zeroized on drop and never appear in `Debug` output.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyStore {
    bytes: [u8; KEY_LEN],
}

impl KeyStore {
    /// Parse a 64-character hex key. Surrounding whitespace is ignored.
    pub fn from_hex(encoded: &str) -> Result<Self, KeyError> {
        let encoded = encoded.trim();
        if encoded.len() != KEY_HEX_LEN {
            return Err(KeyError::InvalidLength {
                expected: KEY_HEX_LEN,
                actual: encoded.len(),
            });
        }

        let mut bytes = [0u8; KEY_LEN];
        hex::decode_to_slice(encoded, &mut bytes)
            .map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Fresh random key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Hex encoding suitable for the configuration file.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore").field("bytes", &"[REDACTED]").finish()
    }
}

/// Source of the process key (configuration value, environment, ...).
pub trait KeyProvider {
    fn load(&self) -> Result<KeyStore, KeyError>;
}

/// Key supplied directly, e.g. from the configuration file.
pub struct StaticKeyProvider {
    encoded: String,
}

impl StaticKeyProvider {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self {
            encoded: encoded.into(),
        }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn load(&self) -> Result<KeyStore, KeyError> {
        KeyStore::from_hex(&self.encoded)
    }
}

impl Drop for StaticKeyProvider {
    fn drop(&mut self) {
        self.encoded.zeroize();
    }
}

/// Key read from an environment variable.
pub struct EnvKeyProvider {
    var: String,
}

impl EnvKeyProvider {
    pub const DEFAULT_VAR: &'static str = "SALESVAULT_ENCRYPTION_KEY";

    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvKeyProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

impl KeyProvider for EnvKeyProvider {
    fn load(&self) -> Result<KeyStore, KeyError> {
        let mut value = std::env::var(&self.var)
            .map_err(|e| KeyError::Missing(format!("{}: {e}", self.var)))?;
        let key = KeyStore::from_hex(&value);
        value.zeroize();
        key
    }
}
