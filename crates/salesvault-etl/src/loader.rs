use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use salesvault_core::{blob_path, CsvOptions, Table, TableSource, ValidationReport, VaultError};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    layout::DatasetLayout,
    outcome::{LoadFailure, LoadOutcome, LoadState},
};

/// Provenance column holding the identifier each row was loaded from.
pub const PERIOD_COLUMN: &str = "period";
/// Provenance column holding the 1-based position of the identifier in the request.
pub const PERIOD_INDEX_COLUMN: &str = "period_index";

/// Loads a dataset of encrypted per-period sources into one table.
pub struct EncryptedDatasetLoader<S: TableSource> {
    source: Arc<S>,
    encrypted_dir: PathBuf,
    layout: DatasetLayout,
}

struct Loaded {
    table: Table,
    report: ValidationReport,
}

/// Everything one load needs, owned so it can move onto a blocking worker.
struct LoadJob<S> {
    source: Arc<S>,
    identifier: String,
    path: PathBuf,
    options: CsvOptions,
    key_column: Option<String>,
}

impl<S: TableSource> LoadJob<S> {
    fn run(self) -> Result<Loaded, VaultError> {
        debug!(identifier = %self.identifier, state = ?LoadState::Loading, "loading source");
        let mut table = self.source.load_table(&self.path, &self.options)?;
        let report =
            ValidationReport::from_table(&self.identifier, &table, self.key_column.as_deref());
        table.set_constant_column(PERIOD_COLUMN, &self.identifier);
        info!(
            identifier = %self.identifier,
            rows = table.len(),
            columns = table.width(),
            "source loaded"
        );
        Ok(Loaded { table, report })
    }
}

impl<S: TableSource> EncryptedDatasetLoader<S> {
    pub fn new(source: S, encrypted_dir: impl Into<PathBuf>, layout: DatasetLayout) -> Self {
        Self::from_shared(Arc::new(source), encrypted_dir, layout)
    }

    pub fn from_shared(
        source: Arc<S>,
        encrypted_dir: impl Into<PathBuf>,
        layout: DatasetLayout,
    ) -> Self {
        Self {
            source,
            encrypted_dir: encrypted_dir.into(),
            layout,
        }
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    pub fn encrypted_dir(&self) -> &Path {
        &self.encrypted_dir
    }

    /// Encrypted path for `identifier`: `<encrypted_dir>/<lowercased identifier>.enc`.
    pub fn path_for(&self, identifier: &str) -> PathBuf {
        blob_path(&self.encrypted_dir, identifier)
    }

    fn job(&self, identifier: &str) -> LoadJob<S> {
        LoadJob {
            source: Arc::clone(&self.source),
            identifier: identifier.to_string(),
            path: self.path_for(identifier),
            options: self.layout.options_for(identifier),
            key_column: self.layout.key_column.clone(),
        }
    }

    /// Load and decode one source, tagged with the `period` column.
    #[instrument(skip(self))]
    pub fn load_one(&self, identifier: &str) -> Result<Table, VaultError> {
        self.job(identifier).run().map(|loaded| loaded.table)
    }

    /// Load every identifier in order, skipping failures.
    ///
    /// Fails with [`VaultError::NoData`] only when nothing loaded.
    #[instrument(skip_all, fields(requested = identifiers.len()))]
    pub fn load_all(&self, identifiers: &[String]) -> Result<LoadOutcome, VaultError> {
        let results = identifiers
            .iter()
            .map(|identifier| self.job(identifier).run())
            .collect();
        assemble(identifiers, results)
    }

    /// Load the periods named by the layout.
    pub fn load_configured(&self) -> Result<LoadOutcome, VaultError> {
        self.load_all(&self.layout.periods)
    }

    /// Load an aggregate source with the shared format. An absent source yields an empty table.
    #[instrument(skip(self))]
    pub fn load_summary(&self, identifier: &str) -> Result<Table, VaultError> {
        let path = self.path_for(identifier);
        if !self.source.exists(&path) {
            warn!(path = %path.display(), "summary source absent");
            return Ok(Table::empty());
        }
        match self.source.load_table(&path, &self.layout.format) {
            Ok(table) => Ok(table),
            Err(VaultError::NotFound { .. }) => {
                warn!(path = %path.display(), "summary source absent");
                Ok(Table::empty())
            }
            Err(err) => Err(err),
        }
    }
}

impl<S: TableSource + 'static> EncryptedDatasetLoader<S> {
    /// Same contract as [`load_all`](Self::load_all), decoding sources on blocking workers.
    #[instrument(skip_all, fields(requested = identifiers.len()))]
    pub async fn load_all_concurrent(
        &self,
        identifiers: &[String],
    ) -> Result<LoadOutcome, VaultError> {
        let mut set = JoinSet::new();
        for (position, identifier) in identifiers.iter().enumerate() {
            let job = self.job(identifier);
            set.spawn_blocking(move || (position, job.run()));
        }

        let mut slots: Vec<Option<Result<Loaded, VaultError>>> =
            (0..identifiers.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((position, result)) => slots[position] = Some(result),
                Err(err) => error!(error = %err, "load worker did not finish"),
            }
        }

        let results = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(VaultError::Worker {
                        reason: "load worker panicked or was cancelled".to_string(),
                    })
                })
            })
            .collect();
        assemble(identifiers, results)
    }
}

fn assemble(
    identifiers: &[String],
    results: Vec<Result<Loaded, VaultError>>,
) -> Result<LoadOutcome, VaultError> {
    let mut tables = Vec::new();
    let mut succeeded = Vec::new();
    let mut failures = Vec::new();
    let mut reports = Vec::new();

    for (position, (identifier, result)) in identifiers.iter().zip(results).enumerate() {
        match result {
            Ok(Loaded { mut table, report }) => {
                table.set_constant_column(PERIOD_INDEX_COLUMN, &(position + 1).to_string());
                tables.push(table);
                reports.push(report);
                succeeded.push(identifier.clone());
            }
            Err(err) => {
                error!(identifier = %identifier, error = %err, "source failed to load");
                failures.push(LoadFailure {
                    identifier: identifier.clone(),
                    error: err,
                });
            }
        }
    }

    if tables.is_empty() {
        let failed: Vec<String> = failures.into_iter().map(|f| f.identifier).collect();
        error!(?failed, "no source could be loaded");
        return Err(VaultError::NoData { failed });
    }

    if !failures.is_empty() {
        let failed: Vec<&str> = failures.iter().map(|f| f.identifier.as_str()).collect();
        warn!(?failed, loaded = succeeded.len(), "dataset is partial");
    }

    let table = Table::concat(tables);
    info!(
        rows = table.len(),
        columns = table.width(),
        sources = succeeded.len(),
        "dataset consolidated"
    );

    Ok(LoadOutcome {
        table,
        succeeded,
        failures,
        reports,
    })
}
