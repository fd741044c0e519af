//! Spreadsheet parsing facade over the `csv` crate.
//!
//! The import pipeline only needs two things from the parser: a cheap header
//! pre-check at submission time, and a lazy, finite, non-restartable sequence
//! of rows at processing time. A malformed record mid-stream surfaces as an
//! `Err` item and is treated by the worker as a pipeline-level fault.

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecordsIntoIter};

use crate::models::StudentRow;

/// Columns every import file must carry. `enrollment_no` is the external key
/// used for the idempotent upsert.
pub const REQUIRED_COLUMNS: &[&str] = &["enrollment_no", "name", "email"];

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("file is empty")]
    Empty,

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("unreadable spreadsheet: {0}")]
    Malformed(#[from] csv::Error),
}

fn normalize_header(raw: &csv::StringRecord) -> Vec<String> {
    raw.iter().map(|h| h.trim().to_lowercase()).collect()
}

/// Parse and validate the header row: non-empty, parseable, and carrying all
/// required columns. This is the submission gate's syntactic pre-check.
pub fn read_header(bytes: &[u8]) -> Result<Vec<String>, SheetError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(SheetError::Empty);
    }

    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let headers = normalize_header(reader.headers()?);
    if headers.iter().all(|h| h.is_empty()) {
        return Err(SheetError::Empty);
    }

    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            return Err(SheetError::MissingColumn(required.to_string()));
        }
    }

    Ok(headers)
}

/// Lazy iterator of data rows. Finite and not restartable; build a new one to
/// read the payload again.
pub struct RowIter<'a> {
    headers: Vec<String>,
    records: StringRecordsIntoIter<&'a [u8]>,
    row_index: i64,
}

/// Open the payload for row iteration. Validates the header first, so an
/// empty or column-less file never yields a `RowIter`.
pub fn parse(bytes: &[u8]) -> Result<RowIter<'_>, SheetError> {
    let headers = read_header(bytes)?;
    let reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);
    Ok(RowIter {
        headers,
        records: reader.into_records(),
        row_index: 0,
    })
}

/// Count data rows with a full streaming pass. The first malformed record
/// aborts the count.
pub fn count_rows(bytes: &[u8]) -> Result<i64, SheetError> {
    let mut count = 0;
    for row in parse(bytes)? {
        row?;
        count += 1;
    }
    Ok(count)
}

impl Iterator for RowIter<'_> {
    type Item = Result<StudentRow, SheetError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(SheetError::Malformed(e))),
        };

        self.row_index += 1;
        let mut fields = HashMap::with_capacity(self.headers.len());
        for (i, header) in self.headers.iter().enumerate() {
            fields.insert(
                header.clone(),
                record.get(i).unwrap_or_default().to_string(),
            );
        }

        Some(Ok(StudentRow::new(self.row_index, fields)))
    }
}
