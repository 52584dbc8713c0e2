//! First-row header detection.
//!
//! Only the first delimited row of a file is read. A row is taken as a header
//! when every cell is an identifier-shaped attribute name and not every cell
//! is a type keyword (`string`, `integer`, `float`, `timestamp`). A row made
//! only of type keywords is treated as data, so a data file whose first row
//! literally holds those words is reported as headerless. That case cannot be
//! told apart from a keyword header and is left as is.

use std::path::Path;

use encoding_rs::Encoding;
use log::debug;
use serde::Serialize;

use crate::{
    error::DiagnoseResult,
    io_utils,
    schema::{SchemaAttribute, TypeTag},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SniffResult {
    pub header: Option<Vec<String>>,
    pub column_count: usize,
}

impl SniffResult {
    pub fn has_header(&self) -> bool {
        self.header.is_some()
    }
}

pub fn sniff(path: &Path, delimiter: u8, encoding: &'static Encoding) -> DiagnoseResult<SniffResult> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, false)?;
    let mut record = csv::ByteRecord::new();
    let has_row = reader
        .read_byte_record(&mut record)
        .map_err(|err| io_utils::csv_error(path, err))?;
    if !has_row {
        debug!("{path:?} is empty; no header detected");
        return Ok(SniffResult {
            header: None,
            column_count: 0,
        });
    }
    let first_row = io_utils::decode_record(&record, encoding, path, 1)?;
    let column_count = first_row.len();
    let header = row_is_header(&first_row).then(|| {
        first_row
            .into_iter()
            .map(|cell| cell.trim().to_string())
            .collect()
    });
    debug!(
        "Sniffed {path:?}: {column_count} column(s), header {}",
        if header.is_some() { "present" } else { "absent" }
    );
    Ok(SniffResult {
        header,
        column_count,
    })
}

pub fn row_is_header(row: &[String]) -> bool {
    if row.is_empty() || row.iter().all(|cell| TypeTag::is_keyword(cell)) {
        return false;
    }
    row.iter()
        .all(|cell| SchemaAttribute::is_valid_name(cell.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn identifier_rows_are_headers() {
        assert!(row_is_header(&cells(&["item_id", "timestamp", "demand"])));
        assert!(row_is_header(&cells(&["sku", "location"])));
    }

    #[test]
    fn data_rows_are_not_headers() {
        assert!(!row_is_header(&cells(&["item_id", "2024-01-01", "10.5"])));
        assert!(!row_is_header(&cells(&["a1", "2024-01-01 00:00:00", "3"])));
    }

    #[test]
    fn type_keyword_rows_are_not_headers() {
        assert!(!row_is_header(&cells(&["string", "timestamp", "float"])));
        assert!(!row_is_header(&cells(&["Integer"])));
    }
}
