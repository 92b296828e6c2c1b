use std::collections::HashSet;

use serde::Serialize;

use crate::table::Table;

/// Null count for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnNulls {
    pub column: String,
    pub nulls: usize,
}

/// Structural quality summary of one decoded batch. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Provenance label of the batch.
    pub source: String,
    pub total_records: usize,
    /// Rows whose key column is non-null (all rows when there is no key column).
    pub valid_records: usize,
    pub columns: usize,
    /// Rows repeating an earlier key value, or an earlier full row when there is no key column.
    pub duplicates: usize,
    pub null_counts: Vec<ColumnNulls>,
}

impl ValidationReport {
    pub fn from_table(source: impl Into<String>, table: &Table, key_column: Option<&str>) -> Self {
        let key_idx = key_column.and_then(|k| table.column_index(k));

        let valid_records = match key_idx {
            Some(idx) => table.rows().iter().filter(|r| r[idx].is_some()).count(),
            None => table.len(),
        };

        let duplicates = match key_idx {
            Some(idx) => count_repeats(table.rows().iter().map(|r| &r[idx])),
            None => count_repeats(table.rows().iter()),
        };

        let null_counts = table
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| ColumnNulls {
                column: column.clone(),
                nulls: table.rows().iter().filter(|r| r[idx].is_none()).count(),
            })
            .collect();

        Self {
            source: source.into(),
            total_records: table.len(),
            valid_records,
            columns: table.width(),
            duplicates,
            null_counts,
        }
    }

    pub fn nulls_in(&self, column: &str) -> Option<usize> {
        self.null_counts
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.nulls)
    }
}

fn count_repeats<'a, T, I>(values: I) -> usize
where
    T: std::hash::Hash + Eq + 'a,
    I: Iterator<Item = &'a T>,
{
    let mut seen = HashSet::new();
    values.filter(|v| !seen.insert(*v)).count()
}
