use crate::utils::error::ClientError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered, unique, case-sensitive column names in header order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Callers guarantee uniqueness; the parser checks it before building one.
    pub(crate) fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One data row. Its key set always equals the owning dataset's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, String>,
}

impl Record {
    /// Pairs schema columns with values, padding missing trailing values with `""`.
    pub(crate) fn from_fields<'a, I>(schema: &Schema, fields: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut values = fields.into_iter();
        let data = schema
            .columns()
            .iter()
            .map(|column| (column.clone(), values.next().unwrap_or("").to_string()))
            .collect();
        Self { data }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.data.get(column).map(String::as_str)
    }
}

/// A parsed upload. Never mutated after construction; a re-upload builds a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    schema: Schema,
    records: Vec<Record>,
    source: String,
}

impl Dataset {
    pub(crate) fn new(schema: Schema, records: Vec<Record>, source: String) -> Self {
        Self {
            schema,
            records,
            source,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The raw text the dataset was parsed from, forwarded verbatim to the service.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn value(&self, index: usize, column: &str) -> Option<&str> {
        self.records.get(index).and_then(|r| r.get(column))
    }
}

/// A template with its placeholder resolved against one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundQuery {
    /// Source row index in the dataset.
    pub index: usize,
    #[serde(rename = "query")]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructuredFields {
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
}

/// One response item as the service sends it. Older services answer with
/// `entity`/`info`, newer ones with `emails`/`phone_numbers`; an item may
/// carry both.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ServicePayload {
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub emails: Option<Vec<String>>,
    #[serde(default)]
    pub phone_numbers: Option<Vec<String>>,
}

/// Canonical per-row extraction result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub index: usize,
    pub raw_column_value: String,
    pub entity: Option<String>,
    pub extracted_text: String,
    pub structured_fields: Option<StructuredFields>,
}

impl ExtractionResult {
    /// Normalizes a service payload, attaching the row identity of the query it answers.
    ///
    /// `info` becomes the extracted text; without it, contacts are joined with `"; "`.
    /// An item with none of `info`, `emails` or `phone_numbers` is rejected.
    pub fn from_payload(
        index: usize,
        raw_column_value: String,
        payload: ServicePayload,
    ) -> Result<Self, ClientError> {
        let ServicePayload {
            entity,
            info,
            emails,
            phone_numbers,
        } = payload;

        let structured_fields = match (emails, phone_numbers) {
            (None, None) => None,
            (emails, phone_numbers) => Some(StructuredFields {
                emails: emails.unwrap_or_default(),
                phone_numbers: phone_numbers.unwrap_or_default(),
            }),
        };

        let extracted_text = match (info, &structured_fields) {
            (Some(info), _) => info,
            (None, Some(fields)) => fields
                .emails
                .iter()
                .chain(fields.phone_numbers.iter())
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("; "),
            (None, None) => {
                return Err(ClientError::InvalidResponse {
                    message: format!("response item {} carries no extraction result", index),
                })
            }
        };

        Ok(Self {
            index,
            raw_column_value,
            entity,
            extracted_text,
            structured_fields,
        })
    }

    /// Flattened `(column, value)` pairs in export order. Structured columns
    /// only appear when the result carries structured fields.
    pub fn to_row(&self) -> Vec<(&'static str, String)> {
        let mut row = vec![
            ("index", self.index.to_string()),
            ("raw_column_value", self.raw_column_value.clone()),
            ("entity", self.entity.clone().unwrap_or_default()),
            ("extracted_text", self.extracted_text.clone()),
        ];
        if let Some(fields) = &self.structured_fields {
            row.push(("emails", fields.emails.join("; ")));
            row.push(("phone_numbers", fields.phone_numbers.join("; ")));
        }
        row
    }
}

/// Identity of a loaded dataset within a session; bumps on every upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetId(pub u64);
