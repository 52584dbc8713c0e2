//! I/O utilities for CSV reading, decoding, and delimiter resolution.
//!
//! All file reads in tts-diagnose flow through this module. It provides:
//!
//! - **Delimiter resolution**: comma by default with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Reader construction**: `open_csv_reader_from_path` builds a flexible
//!   reader so row-width mismatches surface as schema errors, not CSV errors.
//!
//! Access is read-only and sequential; nothing here retries.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use encoding_rs::{Encoding, UTF_8};

use crate::error::{DiagnoseError, DiagnoseResult};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';

pub fn resolve_encoding(label: Option<&str>) -> DiagnoseResult<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes()).ok_or_else(|| {
            DiagnoseError::UnknownEncoding {
                label: value.to_string(),
            }
        })
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(provided: Option<u8>) -> u8 {
    provided.unwrap_or(DEFAULT_CSV_DELIMITER)
}

pub fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
    has_headers: bool,
) -> DiagnoseResult<csv::Reader<BufReader<File>>> {
    let file = File::open(path).map_err(|source| DiagnoseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(open_csv_reader(BufReader::new(file), delimiter, has_headers))
}

pub fn csv_error(path: &Path, source: csv::Error) -> DiagnoseError {
    DiagnoseError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
    path: &Path,
    line: u64,
) -> DiagnoseResult<Vec<String>> {
    record
        .iter()
        .map(|field| {
            decode_bytes(field, encoding).ok_or_else(|| DiagnoseError::Decode {
                path: path.to_path_buf(),
                line,
                encoding: encoding.name(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn csv_extension_check_is_case_insensitive() {
        assert!(has_csv_extension(Path::new("data/part-0.CSV")));
        assert!(has_csv_extension(Path::new("a.csv")));
        assert!(!has_csv_extension(Path::new("a.csv.gz")));
        assert!(!has_csv_extension(Path::new("README")));
    }

    #[test]
    fn resolve_encoding_defaults_to_utf8() {
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(resolve_encoding(Some("windows-1252")).unwrap(), WINDOWS_1252);
        assert!(matches!(
            resolve_encoding(Some("klingon")),
            Err(DiagnoseError::UnknownEncoding { label }) if label == "klingon"
        ));
    }

    #[test]
    fn decode_bytes_rejects_invalid_utf8() {
        assert_eq!(decode_bytes(b"caf\xc3\xa9", UTF_8).as_deref(), Some("caf\u{e9}"));
        assert!(decode_bytes(b"caf\xe9", UTF_8).is_none());
        assert_eq!(
            decode_bytes(b"caf\xe9", WINDOWS_1252).as_deref(),
            Some("caf\u{e9}")
        );
    }
}
