use crate::domain::model::{Dataset, Record, Schema};
use crate::utils::error::ParseError;
use std::collections::HashSet;

const BOM: char = '\u{feff}';

/// Parses uploaded bytes, rejecting anything that is not UTF-8.
pub fn parse_bytes(raw: &[u8]) -> Result<Dataset, ParseError> {
    let text = std::str::from_utf8(raw).map_err(|e| ParseError::Encoding {
        message: e.to_string(),
    })?;
    parse(text)
}

/// Parses comma separated text into a [`Dataset`].
///
/// The first non-empty line is the header. Short rows are padded with empty
/// strings; rows with more fields than the header are rejected.
pub fn parse(raw_text: &str) -> Result<Dataset, ParseError> {
    let text = raw_text.strip_prefix(BOM).unwrap_or(raw_text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(text.as_bytes());

    let mut rows = reader.records();
    let schema = loop {
        match rows.next() {
            None => return Err(ParseError::EmptyInput),
            Some(row) => {
                let row = row.map_err(to_parse_error)?;
                if !is_blank(text, &row) {
                    break header_schema(&row)?;
                }
            }
        }
    };

    let mut records = Vec::new();
    for row in rows {
        let row = row.map_err(to_parse_error)?;
        if is_blank(text, &row) {
            continue;
        }

        if row.len() > schema.len() {
            return Err(ParseError::MalformedRow {
                line: row.position().map(|p| p.line()).unwrap_or_default(),
                expected: schema.len(),
                found: row.len(),
            });
        }

        records.push(Record::from_fields(&schema, row.iter()));
    }

    tracing::debug!(
        "Parsed {} columns and {} records",
        schema.len(),
        records.len()
    );
    Ok(Dataset::new(schema, records, raw_text.to_string()))
}

fn header_schema(row: &csv::StringRecord) -> Result<Schema, ParseError> {
    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(row.len());
    for name in row.iter() {
        if !seen.insert(name) {
            return Err(ParseError::DuplicateColumn {
                name: name.to_string(),
            });
        }
        columns.push(name.to_string());
    }
    Ok(Schema::new(columns))
}

// A line holding nothing but whitespace reads as one blank field. A quoted
// empty value reads the same way, so the raw line decides. Record positions
// can sit before the previous terminator, hence the leading line breaks.
fn is_blank(text: &str, row: &csv::StringRecord) -> bool {
    if row.is_empty() {
        return true;
    }
    if row.len() != 1 || !row[0].trim().is_empty() {
        return false;
    }
    row.position()
        .and_then(|pos| usize::try_from(pos.byte()).ok())
        .and_then(|start| text.get(start..))
        .and_then(|rest| rest.trim_start_matches(['\r', '\n']).lines().next())
        .is_some_and(|line| line.trim().is_empty())
}

fn to_parse_error(err: csv::Error) -> ParseError {
    match err.kind() {
        csv::ErrorKind::Utf8 { err, .. } => ParseError::Encoding {
            message: err.to_string(),
        },
        _ => ParseError::Syntax {
            message: err.to_string(),
        },
    }
}
