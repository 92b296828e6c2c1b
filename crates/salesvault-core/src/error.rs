use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors produced while encrypting, decrypting, or decoding protected datasets.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VaultError {
    /// Local file operation failed (missing source, unwritable directory, short read).
    #[error("io failure at {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },
    /// Requested encrypted source does not exist.
    #[error("encrypted source not found: {}", path.display())]
    NotFound { path: PathBuf },
    /// File is too short to hold a nonce and a tag.
    #[error("malformed blob {}: {len} bytes is shorter than the {min} byte minimum", path.display())]
    MalformedBlob { path: PathBuf, len: u64, min: u64 },
    /// Authentication tag mismatch: the blob was corrupted or tampered with.
    #[error("authentication failed for {}: blob is corrupted or was tampered with", path.display())]
    Authentication { path: PathBuf },
    /// Key or cipher initialization failure.
    #[error("cipher failure: {reason}")]
    Cipher { reason: String },
    /// Decrypted bytes are not valid delimited data under the given options.
    #[error("parse failure in {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
    /// Every requested identifier failed to load.
    #[error("no data loaded: all {} identifiers failed ({})", failed.len(), failed.join(", "))]
    NoData { failed: Vec<String> },
    /// A background load job panicked or was cancelled.
    #[error("worker failure: {reason}")]
    Worker { reason: String },
}

impl VaultError {
    pub fn io(path: impl AsRef<Path>, err: impl ToString) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            reason: err.to_string(),
        }
    }

    pub fn parse(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::Parse {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn cipher(reason: impl ToString) -> Self {
        Self::Cipher {
            reason: reason.to_string(),
        }
    }
}
