use serde::{Deserialize, Serialize};

/// A single cell; `None` is a null (empty field in the source).
pub type Cell = Option<String>;

/// Column-labelled rows decoded from one or more delimited sources.
///
/// Every row has exactly `columns().len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

/// Unchecked wire shape; every row is validated before it becomes a `Table`.
#[derive(Deserialize)]
struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl TryFrom<RawTable> for Table {
    type Error = String;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        let width = raw.columns.len();
        if let Some((idx, row)) = raw.rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(format!("row {idx} has {} cells, expected {width}", row.len()));
        }
        Ok(Table {
            columns: raw.columns,
            rows: raw.rows,
        })
    }
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Table with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom. `None` when the column is absent.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = Option<&str>> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_deref()))
    }

    /// Append a row, padding short rows with nulls. Returns the rejected row
    /// when it is wider than the table.
    pub fn push_row(&mut self, mut row: Vec<Cell>) -> Result<(), Vec<Cell>> {
        if row.len() > self.columns.len() {
            return Err(row);
        }
        row.resize(self.columns.len(), None);
        self.rows.push(row);
        Ok(())
    }

    /// Set `name` to `value` on every row, replacing an existing column of the same name.
    pub fn set_constant_column(&mut self, name: &str, value: &str) {
        match self.column_index(name) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = Some(value.to_string());
                }
            }
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(Some(value.to_string()));
                }
            }
        }
    }

    /// Stack tables vertically. Columns are the union in first-seen order;
    /// cells for columns a table lacks are null.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let total = tables.iter().map(Table::len).sum();
        let mut rows = Vec::with_capacity(total);
        for table in tables {
            let mapping: Vec<usize> = table
                .columns
                .iter()
                .map(|c| columns.iter().position(|u| u == c).unwrap_or_default())
                .collect();
            for row in table.rows {
                let mut out = vec![None; columns.len()];
                for (cell, &target) in row.into_iter().zip(&mapping) {
                    out[target] = cell;
                }
                rows.push(out);
            }
        }

        Table { columns, rows }
    }
}
