use std::collections::BTreeMap;

use salesvault_core::CsvOptions;
use serde::{Deserialize, Serialize};

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Which encrypted sources make up a dataset and how each one is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetLayout {
    /// Identifiers in chronological order.
    pub periods: Vec<String>,
    /// Name of the optional aggregate source.
    pub summary: String,
    /// Column used for valid-record and duplicate counts.
    pub key_column: Option<String>,
    /// Format shared by every source unless overridden.
    pub format: CsvOptions,
    /// Per-identifier delimiter overrides (keys compared case-insensitively).
    pub delimiter_overrides: BTreeMap<String, char>,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            periods: MONTHS.iter().map(|m| m.to_string()).collect(),
            summary: "anual".to_string(),
            key_column: Some("IDProducto".to_string()),
            format: CsvOptions::default(),
            delimiter_overrides: BTreeMap::from([("noviembre".to_string(), '\t')]),
        }
    }
}

impl DatasetLayout {
    /// Format options for one identifier: the shared format plus any delimiter override.
    pub fn options_for(&self, identifier: &str) -> CsvOptions {
        let wanted = identifier.to_lowercase();
        self.delimiter_overrides
            .iter()
            .find(|(name, _)| name.to_lowercase() == wanted)
            .map(|(_, &delimiter)| self.format.with_delimiter(delimiter))
            .unwrap_or(self.format)
    }
}
