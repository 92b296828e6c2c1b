//! Core contracts for salesvault: decoded tables, validation reports, the error
//! taxonomy, and the `TableSource` seam between storage and dataset loading.

pub mod error;
pub mod report;
pub mod source;
pub mod table;

pub use error::VaultError;
pub use report::{ColumnNulls, ValidationReport};
pub use source::{
    blob_path, CsvOptions, Encoding, InMemoryTableSource, NullTokens, TableSource,
    BLOB_EXTENSION,
};
pub use table::{Cell, Table};
