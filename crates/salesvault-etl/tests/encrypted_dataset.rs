use std::{fs, path::Path, sync::Arc};

use salesvault_core::VaultError;
use salesvault_etl::{
    DatasetLayout, EncryptedDatasetLoader, LoadState, PERIOD_COLUMN, PERIOD_INDEX_COLUMN,
};
use salesvault_storage::{KeyStore, SecureDataManager};
use tempfile::TempDir;

/// Export with the ten-line preamble the sales system writes before the header.
fn export(delimiter: char, rows: &[(&str, &str)]) -> Vec<u8> {
    let mut text = String::new();
    for line in 0..10 {
        text.push_str(&format!("Informe de ventas, linea {line}\n"));
    }
    text.push_str(&format!(" IDProducto {delimiter}Descripci\u{f3}n {delimiter} Ventas\n"));
    for (id, sales) in rows {
        text.push_str(&format!("{id}{delimiter}Caf\u{e9}{delimiter}{sales}\n"));
    }
    text.chars().map(|c| c as u8).collect()
}

struct Fixture {
    root: TempDir,
    manager: SecureDataManager,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().expect("temp dir");
        fs::create_dir_all(root.path().join("raw")).expect("raw dir");
        let manager = SecureDataManager::new(
            Arc::new(KeyStore::generate()),
            root.path().join("encrypted"),
        )
        .with_scratch_dir(root.path().join("scratch"));
        Self { root, manager }
    }

    fn raw(&self, name: &str, bytes: &[u8]) {
        fs::write(self.root.path().join("raw").join(name), bytes).expect("write raw");
    }

    fn encrypt(&self) -> usize {
        self.manager
            .encrypt_all(&self.root.path().join("raw"), "*.csv")
            .expect("encrypt")
            .len()
    }

    fn loader(&self) -> EncryptedDatasetLoader<SecureDataManager> {
        EncryptedDatasetLoader::new(
            self.manager.clone(),
            self.manager.encrypted_dir(),
            DatasetLayout::default(),
        )
    }

    fn scratch_is_empty(&self) -> bool {
        dir_is_empty(&self.root.path().join("scratch"))
    }
}

fn dir_is_empty(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

fn months(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn loads_encrypted_months_with_override_and_gap() {
    let fx = Fixture::new();
    fx.raw("enero.csv", &export(';', &[("1", "10"), ("2", "20")]));
    fx.raw("noviembre.csv", &export('\t', &[("3", "30")]));
    assert_eq!(fx.encrypt(), 2);

    let outcome = fx
        .loader()
        .load_all(&months(&["enero", "febrero", "noviembre"]))
        .expect("partial load succeeds");

    assert_eq!(outcome.succeeded, ["enero", "noviembre"]);
    assert_eq!(outcome.state_of("febrero"), LoadState::Failed);
    assert!(matches!(
        outcome.failures[0].error,
        VaultError::NotFound { .. }
    ));

    let table = &outcome.table;
    assert_eq!(
        table.columns(),
        ["IDProducto", "Descripción", "Ventas", PERIOD_COLUMN, PERIOD_INDEX_COLUMN]
    );
    assert_eq!(table.len(), 3);
    assert_eq!(table.rows()[0][1].as_deref(), Some("Café"));
    let positions: Vec<_> = table.column(PERIOD_INDEX_COLUMN).expect("index").collect();
    assert_eq!(positions, [Some("1"), Some("1"), Some("3")]);

    assert_eq!(outcome.reports[1].source, "noviembre");
    assert_eq!(outcome.reports[1].valid_records, 1);
    assert!(fx.scratch_is_empty());
}

#[test]
fn tampered_blob_is_a_failed_period_not_a_fatal_error() {
    let fx = Fixture::new();
    fx.raw("enero.csv", &export(';', &[("1", "10")]));
    fx.raw("marzo.csv", &export(';', &[("2", "20")]));
    fx.encrypt();

    let blob = fx.manager.blob_path("marzo");
    let mut bytes = fs::read(&blob).expect("read blob");
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    fs::write(&blob, bytes).expect("write tampered blob");

    let outcome = fx
        .loader()
        .load_all(&months(&["enero", "marzo"]))
        .expect("enero still loads");
    assert_eq!(outcome.succeeded, ["enero"]);
    assert!(matches!(
        outcome.failures[0].error,
        VaultError::Authentication { .. }
    ));
    assert!(fx.scratch_is_empty());
}

#[test]
fn nothing_encrypted_is_no_data() {
    let fx = Fixture::new();
    let err = fx
        .loader()
        .load_all(&months(&["enero", "febrero"]))
        .expect_err("no blobs");
    assert!(matches!(err, VaultError::NoData { ref failed } if failed.len() == 2));
}

#[test]
fn summary_is_optional() {
    let fx = Fixture::new();
    assert!(fx.loader().load_summary("anual").expect("absent").is_empty());

    fx.raw("anual.csv", &export(';', &[("1", "120"), ("2", "240")]));
    fx.encrypt();
    let summary = fx.loader().load_summary("anual").expect("present");
    assert_eq!(summary.len(), 2);
    assert!(fx.scratch_is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_load_uses_distinct_scratch_files() {
    let fx = Fixture::new();
    let names = ["enero", "febrero", "marzo", "abril", "mayo", "junio"];
    for (idx, name) in names.iter().enumerate() {
        let id = idx.to_string();
        fx.raw(&format!("{name}.csv"), &export(';', &[(id.as_str(), "1")]));
    }
    fx.encrypt();

    let outcome = fx
        .loader()
        .load_all_concurrent(&months(&names))
        .await
        .expect("concurrent load");

    assert_eq!(outcome.succeeded, names);
    assert!(outcome.failures.is_empty());
    let ids: Vec<_> = outcome.table.column("IDProducto").expect("ids").collect();
    assert_eq!(ids, [Some("0"), Some("1"), Some("2"), Some("3"), Some("4"), Some("5")]);
    assert!(fx.scratch_is_empty());
}
