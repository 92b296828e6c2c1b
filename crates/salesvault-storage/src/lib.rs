//! Encryption at rest for tabular sources.
//! Streaming AES-256-GCM blobs, a single process key, and decrypt-then-parse
//! loading through short-lived scratch files.

mod gcm;

pub mod delimited;
pub mod file_cipher;
pub mod key_store;
pub mod secure_data_manager;

pub use file_cipher::{FileCipher, BLOB_OVERHEAD, CHUNK_SIZE};
pub use key_store::{EnvKeyProvider, KeyError, KeyProvider, KeyStore, StaticKeyProvider};
pub use salesvault_core::BLOB_EXTENSION;
pub use secure_data_manager::{matches_pattern, SecureDataManager};
