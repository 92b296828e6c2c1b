use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};

use crate::{error::VaultError, table::Table};

/// Extension given to every encrypted source.
pub const BLOB_EXTENSION: &str = "enc";

/// Blob path for a logical source name: `<dir>/<lowercased name>.enc`.
pub fn blob_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{BLOB_EXTENSION}", name.to_lowercase()))
}

/// Character encoding of a delimited source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Utf8,
    /// ISO-8859-1; every byte maps to the code point of the same value.
    #[default]
    Latin1,
}

/// Markers the export tools write for a missing value, besides an empty field.
const STANDARD_NULL_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Which field values decode as null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullTokens {
    /// Empty fields plus the common missing-value markers (`NA`, `N/A`, `NULL`, `nan`, ...).
    #[default]
    Standard,
    /// Only empty fields.
    EmptyOnly,
}

impl NullTokens {
    /// Whether the decoded field `value` is a null. Matching is exact, without trimming.
    pub fn is_null(self, value: &str) -> bool {
        match self {
            NullTokens::Standard => value.is_empty() || STANDARD_NULL_TOKENS.contains(&value),
            NullTokens::EmptyOnly => value.is_empty(),
        }
    }
}

/// Caller-supplied format options for decoding one delimited source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub encoding: Encoding,
    pub delimiter: char,
    /// Physical lines to skip before the header row.
    pub skip_rows: usize,
    pub null_tokens: NullTokens,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            encoding: Encoding::Latin1,
            delimiter: ';',
            skip_rows: 10,
            null_tokens: NullTokens::Standard,
        }
    }
}

impl CsvOptions {
    pub fn with_delimiter(self, delimiter: char) -> Self {
        Self { delimiter, ..self }
    }

    pub fn with_skip_rows(self, skip_rows: usize) -> Self {
        Self { skip_rows, ..self }
    }

    pub fn with_encoding(self, encoding: Encoding) -> Self {
        Self { encoding, ..self }
    }

    pub fn with_null_tokens(self, null_tokens: NullTokens) -> Self {
        Self {
            null_tokens,
            ..self
        }
    }
}

/// Contract for anything that can turn an encrypted source path into a decoded table.
pub trait TableSource: Send + Sync {
    /// Decode the source at `path` using `options`.
    fn load_table(&self, path: &Path, options: &CsvOptions) -> Result<Table, VaultError>;

    /// Whether a source exists at `path`.
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

impl<S: TableSource + ?Sized> TableSource for Arc<S> {
    fn load_table(&self, path: &Path, options: &CsvOptions) -> Result<Table, VaultError> {
        (**self).load_table(path, options)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }
}

/// In-memory table source for tests and dry runs. Records the options each load used.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTableSource {
    tables: Arc<Mutex<HashMap<PathBuf, Result<Table, VaultError>>>>,
    calls: Arc<Mutex<Vec<(PathBuf, CsvOptions)>>>,
}

impl InMemoryTableSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, table: Table) {
        if let Ok(mut map) = self.tables.lock() {
            map.insert(path.into(), Ok(table));
        }
    }

    /// Make loads of `path` fail with `error`.
    pub fn insert_failure(&self, path: impl Into<PathBuf>, error: VaultError) {
        if let Ok(mut map) = self.tables.lock() {
            map.insert(path.into(), Err(error));
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, CsvOptions)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl TableSource for InMemoryTableSource {
    fn load_table(&self, path: &Path, options: &CsvOptions) -> Result<Table, VaultError> {
        let map = self.tables.lock().map_err(|err| VaultError::Worker {
            reason: format!("lock poisoned: {err}"),
        })?;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((path.to_path_buf(), *options));
        }

        map.get(path).cloned().unwrap_or_else(|| {
            Err(VaultError::NotFound {
                path: path.to_path_buf(),
            })
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.tables
            .lock()
            .map(|map| map.contains_key(path))
            .unwrap_or(false)
    }
}
