use std::{
    fs,
    io::{BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use salesvault_core::{blob_path, CsvOptions, Table, TableSource, VaultError, BLOB_EXTENSION};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, instrument, warn};

use crate::{delimited::read_table, file_cipher::FileCipher, key_store::KeyStore};

/// Batch encryption of plaintext sources and transparent decrypt-then-parse of blobs.
///
/// Plaintext only ever exists in a uniquely named scratch file owned by a
/// single `load_table` call and removed before that call returns.
#[derive(Debug, Clone)]
pub struct SecureDataManager {
    cipher: FileCipher,
    encrypted_dir: PathBuf,
    scratch_dir: Option<PathBuf>,
}

impl SecureDataManager {
    pub fn new(key: Arc<KeyStore>, encrypted_dir: impl Into<PathBuf>) -> Self {
        Self {
            cipher: FileCipher::new(key),
            encrypted_dir: encrypted_dir.into(),
            scratch_dir: None,
        }
    }

    /// Directory for ephemeral plaintext; defaults to the OS temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn encrypted_dir(&self) -> &Path {
        &self.encrypted_dir
    }

    /// Blob path for a logical source name: `<encrypted_dir>/<lowercased>.enc`.
    pub fn blob_path(&self, name: &str) -> PathBuf {
        blob_path(&self.encrypted_dir, name)
    }

    /// Encrypt every file in `source_dir` whose name matches `pattern`
    /// (`*` and `?` wildcards) into `<encrypted_dir>/<stem>.enc`.
    ///
    /// Individual failures are logged and skipped; the returned list holds
    /// only blobs that were fully written.
    #[instrument(skip_all, fields(source_dir = %source_dir.display(), pattern = %pattern))]
    pub fn encrypt_all(
        &self,
        source_dir: &Path,
        pattern: &str,
    ) -> Result<Vec<PathBuf>, VaultError> {
        let entries = fs::read_dir(source_dir).map_err(|e| VaultError::io(source_dir, e))?;
        let mut sources: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| matches_pattern(n, pattern))
            })
            .collect();
        sources.sort();

        if sources.is_empty() {
            warn!("no files matched");
            return Ok(Vec::new());
        }
        info!(count = sources.len(), "encrypting sources");

        let mut written = Vec::with_capacity(sources.len());
        for source in &sources {
            let stem = source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let dest = self.encrypted_dir.join(format!("{stem}.{BLOB_EXTENSION}"));
            match self.cipher.encrypt(source, &dest) {
                Ok(()) => written.push(dest),
                Err(err) => error!(source = %source.display(), %err, "failed to encrypt"),
            }
        }

        info!(
            encrypted = written.len(),
            failed = sources.len() - written.len(),
            "batch encryption finished"
        );
        Ok(written)
    }

    /// Decrypt `encrypted_path` into a scratch file, parse it with `options`,
    /// and return the table. The scratch file is removed on every exit path.
    #[instrument(skip_all, fields(path = %encrypted_path.display()))]
    pub fn load_table(
        &self,
        encrypted_path: &Path,
        options: &CsvOptions,
    ) -> Result<Table, VaultError> {
        if !encrypted_path.is_file() {
            return Err(VaultError::NotFound {
                path: encrypted_path.to_path_buf(),
            });
        }

        let mut scratch = self.scratch_file()?;
        let scratch_path = scratch.path().to_path_buf();
        debug!(scratch = %scratch_path.display(), "decrypting to scratch file");

        {
            let mut writer = BufWriter::new(scratch.as_file_mut());
            self.cipher.decrypt_file_to(encrypted_path, &mut writer)?;
            writer
                .flush()
                .map_err(|e| VaultError::io(&scratch_path, e))?;
        }

        let file = scratch.as_file_mut();
        file.seek(SeekFrom::Start(0))
            .map_err(|e| VaultError::io(&scratch_path, e))?;
        let table = read_table(&*file, options, encrypted_path)?;

        debug!(rows = table.len(), columns = table.width(), "table loaded");
        Ok(table)
    }

    fn scratch_file(&self) -> Result<NamedTempFile, VaultError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("salesvault-").suffix(".csv");
        match &self.scratch_dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|e| VaultError::io(dir, e))?;
                builder.tempfile_in(dir).map_err(|e| VaultError::io(dir, e))
            }
            None => builder
                .tempfile()
                .map_err(|e| VaultError::io(std::env::temp_dir(), e)),
        }
    }
}

impl TableSource for SecureDataManager {
    fn load_table(&self, path: &Path, options: &CsvOptions) -> Result<Table, VaultError> {
        SecureDataManager::load_table(self, path, options)
    }
}

/// File-name wildcard match: `*` is any run of characters, `?` exactly one.
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    let name: Vec<char> = name.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut n, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some(&c) if c == '?' || c == name[n] => {
                n += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    n = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}
