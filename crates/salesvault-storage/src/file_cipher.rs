//! Chunked authenticated encryption of single files.
//!
//! Blob layout: `nonce[12] || ciphertext[N] || tag[16]`, no header and no length
//! prefix. `N` equals the plaintext length, so every blob is exactly
//! [`BLOB_OVERHEAD`] bytes larger than its source.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind, Read, Write},
    path::Path,
    sync::Arc,
};

use aes_gcm::{
    aead::{AeadCore, OsRng},
    Aes256Gcm,
};
use salesvault_core::VaultError;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::{
    gcm::{GcmStream, MAX_PLAINTEXT_LEN, NONCE_LEN, TAG_LEN},
    key_store::KeyStore,
};

/// Read buffer size for both directions.
pub const CHUNK_SIZE: usize = 64 * 1024;
/// Bytes a blob adds on top of its plaintext (nonce + tag).
pub const BLOB_OVERHEAD: u64 = (NONCE_LEN + TAG_LEN) as u64;

/// Encrypts and decrypts whole files under one shared key.
#[derive(Debug, Clone)]
pub struct FileCipher {
    key: Arc<KeyStore>,
}

impl FileCipher {
    pub fn new(key: Arc<KeyStore>) -> Self {
        Self { key }
    }

    /// Encrypt `source` into a blob at `dest`, creating parent directories.
    ///
    /// The blob is assembled in a sibling temp file and renamed into place only
    /// once the tag has been written, so `dest` never holds a partial blob.
    #[instrument(skip_all, fields(source = %source.display(), dest = %dest.display()))]
    pub fn encrypt(&self, source: &Path, dest: &Path) -> Result<(), VaultError> {
        let input = File::open(source).map_err(|e| VaultError::io(source, e))?;
        let len = input
            .metadata()
            .map_err(|e| VaultError::io(source, e))?
            .len();
        if len > MAX_PLAINTEXT_LEN {
            return Err(VaultError::cipher(format!(
                "{} is {len} bytes, above the {MAX_PLAINTEXT_LEN} byte limit for one nonce",
                source.display()
            )));
        }

        let mut staged = stage_beside(dest)?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            self.encrypt_stream(BufReader::new(input), &mut writer, source)?;
            writer.flush().map_err(|e| VaultError::io(dest, e))?;
        }
        staged
            .as_file()
            .sync_all()
            .map_err(|e| VaultError::io(dest, e))?;
        staged.persist(dest).map_err(|e| VaultError::io(dest, e.error))?;

        info!(bytes = len, "encrypted file");
        Ok(())
    }

    /// Decrypt the blob at `source` into `dest`, creating parent directories.
    ///
    /// Plaintext is staged in a sibling temp file and only renamed onto `dest`
    /// after the tag verifies; on any failure nothing is left at `dest`.
    #[instrument(skip_all, fields(source = %source.display(), dest = %dest.display()))]
    pub fn decrypt(&self, source: &Path, dest: &Path) -> Result<(), VaultError> {
        let mut staged = stage_beside(dest)?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            self.decrypt_file_to(source, &mut writer)?;
            writer.flush().map_err(|e| VaultError::io(dest, e))?;
        }
        staged.persist(dest).map_err(|e| VaultError::io(dest, e.error))?;

        info!("decrypted file");
        Ok(())
    }

    /// Open `source`, check its length, and stream its plaintext into `writer`.
    /// Returns the number of plaintext bytes written.
    ///
    /// On `Err` whatever reached `writer` is unauthenticated and must be discarded.
    pub fn decrypt_file_to<W: Write>(
        &self,
        source: &Path,
        writer: &mut W,
    ) -> Result<u64, VaultError> {
        let input = File::open(source).map_err(|e| VaultError::io(source, e))?;
        let len = input
            .metadata()
            .map_err(|e| VaultError::io(source, e))?
            .len();
        self.decrypt_stream(BufReader::new(input), len, writer, source)
    }

    /// Encrypt everything from `reader` into `writer` as a complete blob.
    ///
    /// `label` only names the stream in errors and logs.
    pub fn encrypt_stream<R: Read, W: Write>(
        &self,
        mut reader: R,
        writer: &mut W,
        label: &Path,
    ) -> Result<u64, VaultError> {
        let nonce = fresh_nonce();
        let mut stream = GcmStream::new(&self.key, &nonce);
        writer
            .write_all(&nonce)
            .map_err(|e| VaultError::io(label, e))?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(VaultError::io(label, e)),
            };
            total += n as u64;
            if total > MAX_PLAINTEXT_LEN {
                return Err(VaultError::cipher(format!(
                    "{} exceeds the {MAX_PLAINTEXT_LEN} byte limit for one nonce",
                    label.display()
                )));
            }
            stream.encrypt_chunk(&mut buf[..n]);
            writer
                .write_all(&buf[..n])
                .map_err(|e| VaultError::io(label, e))?;
        }

        writer
            .write_all(&stream.finalize())
            .map_err(|e| VaultError::io(label, e))?;
        debug!(plaintext_bytes = total, "sealed stream");
        Ok(total)
    }

    /// Decrypt a blob of `blob_len` bytes from `reader` into `writer`.
    ///
    /// Authenticity is only known at the end: on `Err(Authentication)` the bytes
    /// already written are untrusted and must be discarded by the caller.
    pub fn decrypt_stream<R: Read, W: Write>(
        &self,
        mut reader: R,
        blob_len: u64,
        writer: &mut W,
        label: &Path,
    ) -> Result<u64, VaultError> {
        if blob_len < BLOB_OVERHEAD {
            return Err(VaultError::MalformedBlob {
                path: label.to_path_buf(),
                len: blob_len,
                min: BLOB_OVERHEAD,
            });
        }
        let ciphertext_len = blob_len - BLOB_OVERHEAD;
        if ciphertext_len > MAX_PLAINTEXT_LEN {
            return Err(VaultError::cipher(format!(
                "{} holds {ciphertext_len} ciphertext bytes, above the {MAX_PLAINTEXT_LEN} byte limit",
                label.display()
            )));
        }

        let mut nonce = [0u8; NONCE_LEN];
        reader
            .read_exact(&mut nonce)
            .map_err(|e| VaultError::io(label, e))?;
        let mut stream = GcmStream::new(&self.key, &nonce);

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut remaining = ciphertext_len;
        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            reader
                .read_exact(&mut buf[..want])
                .map_err(|e| VaultError::io(label, e))?;
            stream.decrypt_chunk(&mut buf[..want]);
            writer
                .write_all(&buf[..want])
                .map_err(|e| VaultError::io(label, e))?;
            remaining -= want as u64;
        }

        let mut tag = [0u8; TAG_LEN];
        reader
            .read_exact(&mut tag)
            .map_err(|e| VaultError::io(label, e))?;

        if !stream.verify(&tag) {
            warn!(source = %label.display(), "authentication tag mismatch");
            return Err(VaultError::Authentication {
                path: label.to_path_buf(),
            });
        }
        Ok(ciphertext_len)
    }
}

fn fresh_nonce() -> [u8; NONCE_LEN] {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut out = [0u8; NONCE_LEN];
    out.copy_from_slice(nonce.as_slice());
    out
}

/// Temp file in the destination's directory so the final rename stays on one filesystem.
fn stage_beside(dest: &Path) -> Result<NamedTempFile, VaultError> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;
    tempfile::Builder::new()
        .prefix(".salesvault-")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|e| VaultError::io(parent, e))
}
