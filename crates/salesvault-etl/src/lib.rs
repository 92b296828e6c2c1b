//! Dataset loading over encrypted per-period sources: resolve identifiers to
//! blobs, decode each through a `TableSource`, and consolidate the survivors.

pub mod layout;
pub mod loader;
pub mod outcome;

pub use layout::DatasetLayout;
pub use loader::{EncryptedDatasetLoader, PERIOD_COLUMN, PERIOD_INDEX_COLUMN};
pub use outcome::{LoadFailure, LoadOutcome, LoadState};
