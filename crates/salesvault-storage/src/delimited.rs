use std::{
    collections::HashMap,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use salesvault_core::{Cell, CsvOptions, Encoding, Table, VaultError};

/// Decode delimited text from `reader` into a table.
///
/// `skip_rows` physical lines are dropped, the next record is the header
/// (names trimmed, repeats renamed `name.1`, `name.2`, ...), and fields matching
/// `null_tokens` become nulls. `label` names the source in errors.
pub fn read_table<R: Read>(
    reader: R,
    options: &CsvOptions,
    label: &Path,
) -> Result<Table, VaultError> {
    let delimiter = delimiter_byte(options.delimiter, label)?;
    let mut reader = BufReader::new(reader);

    let mut discard = Vec::new();
    for _ in 0..options.skip_rows {
        discard.clear();
        let read = reader
            .read_until(b'\n', &mut discard)
            .map_err(|e| VaultError::io(label, e))?;
        if read == 0 {
            break;
        }
    }

    let mut csv = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header = csv
        .byte_headers()
        .map_err(|e| VaultError::parse(label, e))?
        .clone();
    if header.is_empty() {
        return Err(VaultError::parse(
            label,
            format!("no header row after skipping {} lines", options.skip_rows),
        ));
    }

    let names = header
        .iter()
        .map(|field| decode(field, options.encoding, label).map(|s| s.trim().to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    let mut table = Table::new(dedupe(names));

    for record in csv.byte_records() {
        let record = record.map_err(|e| VaultError::parse(label, e))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row = record
            .iter()
            .map(|field| {
                let value = decode(field, options.encoding, label)?;
                Ok((!options.null_tokens.is_null(&value)).then_some(value))
            })
            .collect::<Result<Vec<Cell>, VaultError>>()?;

        table.push_row(row).map_err(|rejected| {
            VaultError::parse(
                label,
                format!(
                    "line {line}: expected at most {} fields, saw {}",
                    header.len(),
                    rejected.len()
                ),
            )
        })?;
    }

    Ok(table)
}

fn delimiter_byte(delimiter: char, label: &Path) -> Result<u8, VaultError> {
    if delimiter.is_ascii() && delimiter != '\n' && delimiter != '\r' {
        Ok(delimiter as u8)
    } else {
        Err(VaultError::parse(
            label,
            format!("delimiter {delimiter:?} must be a single ASCII character"),
        ))
    }
}

fn decode(field: &[u8], encoding: Encoding, label: &Path) -> Result<String, VaultError> {
    match encoding {
        Encoding::Utf8 => std::str::from_utf8(field)
            .map(str::to_string)
            .map_err(|e| VaultError::parse(label, format!("invalid utf-8: {e}"))),
        Encoding::Latin1 => Ok(field.iter().map(|&b| char::from(b)).collect()),
    }
}

fn dedupe(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        while let Some(count) = seen.get_mut(&candidate) {
            *count += 1;
            candidate = format!("{name}.{count}");
        }
        seen.insert(candidate.clone(), 0);
        out.push(candidate);
    }
    out
}
