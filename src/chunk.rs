//! Bounded-size chunked reading of one CSV file.
//!
//! [`ChunkReader`] pulls at most `chunk_size` records per call and returns
//! them as a [`RawChunk`] of trimmed text cells, with null tokens already
//! mapped to `None`. [`TypedChunk::parse`] then coerces a raw chunk through a
//! resolved schema. Row data in memory is bounded by the chunk size.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;

use crate::{
    data::{self, Value},
    error::{DiagnoseError, DiagnoseResult},
    io_utils,
    schema::Schema,
    sniff::SniffResult,
    validate::SchemaOrigin,
};

pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub file_index: usize,
    /// Zero-based data-row ordinal of the first row within its file.
    pub first_row: u64,
    /// One-based source line of each row.
    pub lines: Vec<u64>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawChunk {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = Option<&str>> {
        self.rows
            .iter()
            .map(move |row| row.get(index).and_then(|cell| cell.as_deref()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedChunk {
    pub file_index: usize,
    pub first_row: u64,
    pub rows: Vec<Vec<Option<Value>>>,
}

impl TypedChunk {
    pub fn parse(raw: RawChunk, schema: &Schema, path: &Path) -> DiagnoseResult<Self> {
        let mut rows = Vec::with_capacity(raw.rows.len());
        for (row, line) in raw.rows.into_iter().zip(raw.lines) {
            let typed = row
                .into_iter()
                .zip(schema.attributes())
                .map(|(cell, attribute)| {
                    let Some(text) = cell else {
                        return Ok(None);
                    };
                    data::parse_typed_value(&text, attribute.attribute_type().affinity())
                        .map(Some)
                        .ok_or_else(|| DiagnoseError::InvalidValue {
                            path: path.to_path_buf(),
                            line,
                            column: attribute.name().to_string(),
                            expected: attribute.attribute_type(),
                            value: text,
                        })
                })
                .collect::<DiagnoseResult<Vec<_>>>()?;
            rows.push(typed);
        }
        Ok(Self {
            file_index: raw.file_index,
            first_row: raw.first_row,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct ChunkReader {
    reader: csv::Reader<BufReader<File>>,
    record: csv::ByteRecord,
    path: PathBuf,
    encoding: &'static Encoding,
    origin: SchemaOrigin,
    file_index: usize,
    chunk_size: usize,
    expected_width: usize,
    header_lines: u64,
    rows_read: u64,
    finished: bool,
}

impl ChunkReader {
    pub fn open(
        path: &Path,
        file_index: usize,
        layout: &SniffResult,
        delimiter: u8,
        encoding: &'static Encoding,
        chunk_size: usize,
        origin: SchemaOrigin,
    ) -> DiagnoseResult<Self> {
        let reader = io_utils::open_csv_reader_from_path(path, delimiter, layout.has_header())?;
        Ok(Self {
            reader,
            record: csv::ByteRecord::new(),
            path: path.to_path_buf(),
            encoding,
            origin,
            file_index,
            chunk_size: chunk_size.max(1),
            expected_width: layout.column_count,
            header_lines: u64::from(layout.has_header()),
            rows_read: 0,
            finished: false,
        })
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn next_chunk(&mut self) -> DiagnoseResult<Option<RawChunk>> {
        if self.finished {
            return Ok(None);
        }
        let first_row = self.rows_read;
        let mut lines = Vec::with_capacity(self.chunk_size.min(1024));
        let mut rows = Vec::with_capacity(self.chunk_size.min(1024));
        while rows.len() < self.chunk_size {
            let more = self
                .reader
                .read_byte_record(&mut self.record)
                .map_err(|err| io_utils::csv_error(&self.path, err))?;
            if !more {
                self.finished = true;
                break;
            }
            let line = self
                .record
                .position()
                .map(|pos| pos.line())
                .unwrap_or(self.rows_read + self.header_lines + 1);
            if self.record.len() != self.expected_width {
                return Err(DiagnoseError::SchemaColumnMismatch {
                    origin: self.origin,
                    path: self.path.clone(),
                    column: self.record.len().min(self.expected_width),
                    expected: format!("one of {} column(s)", self.expected_width),
                    found: format!("{} field(s) on line {line}", self.record.len()),
                });
            }
            let decoded = io_utils::decode_record(&self.record, self.encoding, &self.path, line)?;
            let row = decoded
                .into_iter()
                .map(|cell| {
                    if data::is_null_token(&cell) {
                        None
                    } else {
                        Some(cell.trim().to_string())
                    }
                })
                .collect();
            rows.push(row);
            lines.push(line);
            self.rows_read += 1;
        }
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(RawChunk {
            file_index: self.file_index,
            first_row,
            lines,
            rows,
        }))
    }
}

impl Iterator for ChunkReader {
    type Item = DiagnoseResult<RawChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaAttribute, TypeTag};
    use encoding_rs::UTF_8;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write csv");
        file
    }

    fn layout(header: bool, width: usize) -> SniffResult {
        SniffResult {
            header: header.then(|| (0..width).map(|i| format!("c{i}")).collect()),
            column_count: width,
        }
    }

    #[test]
    fn reads_bounded_chunks_and_maps_nulls() {
        let file = write_csv("a,b\n1,x\n2,NA\n3,\n4,y\n5,z\n");
        let mut reader = ChunkReader::open(
            file.path(),
            0,
            &layout(true, 2),
            b',',
            UTF_8,
            2,
            SchemaOrigin::Inferred,
        )
        .expect("open reader");
        let chunks = reader
            .by_ref()
            .collect::<DiagnoseResult<Vec<_>>>()
            .expect("read chunks");
        assert_eq!(chunks.iter().map(RawChunk::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        assert_eq!(chunks[1].first_row, 2);
        assert_eq!(chunks[0].lines, vec![2, 3]);
        assert_eq!(chunks[0].rows[1], vec![Some("2".into()), None]);
        assert_eq!(chunks[1].rows[0], vec![Some("3".into()), None]);
        assert_eq!(reader.rows_read(), 5);
    }

    #[test]
    fn ragged_rows_are_schema_mismatches() {
        let file = write_csv("1,x\n2,y,extra\n");
        let mut reader = ChunkReader::open(
            file.path(),
            0,
            &layout(false, 2),
            b',',
            UTF_8,
            10,
            SchemaOrigin::Explicit,
        )
        .expect("open reader");
        let err = reader.next_chunk().unwrap_err();
        assert!(matches!(err, DiagnoseError::SchemaColumnMismatch { column: 2, .. }));
    }

    #[test]
    fn typed_parse_reports_offending_cell() {
        let schema = Schema::new(vec![
            SchemaAttribute::new("qty", TypeTag::Integer).unwrap(),
            SchemaAttribute::new("at", TypeTag::Timestamp).unwrap(),
        ])
        .unwrap();
        let raw = RawChunk {
            file_index: 0,
            first_row: 0,
            lines: vec![2, 3],
            rows: vec![
                vec![Some("4".into()), Some("2024-01-01".into())],
                vec![Some("4.5".into()), None],
            ],
        };
        let err = TypedChunk::parse(raw, &schema, Path::new("f.csv")).unwrap_err();
        match err {
            DiagnoseError::InvalidValue {
                line,
                column,
                expected,
                ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, "qty");
                assert_eq!(expected, TypeTag::Integer);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
