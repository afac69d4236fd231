//! Record source boundary.
//!
//! The index is typically fed from some relational or external data origin.
//! That origin is not part of the engine; it only has to implement
//! [`RecordSource`], and [`document_from_record`] maps each record's columns
//! 1:1 onto indexed-and-stored document fields. Any other origin (file,
//! stream, API) can replace it behind the same trait.
//!
//! # Examples
//!
//! ```
//! use xiphos::source::{Record, RecordSource, RecordValue, SliceRecordSource, document_from_record};
//!
//! let records = vec![
//!     Record::new()
//!         .with_column("id", RecordValue::Integer(1))
//!         .with_column("bookName", RecordValue::Text("Java Programming".into()))
//!         .with_column("price", RecordValue::Float(71.5)),
//! ];
//! let source = SliceRecordSource::new(records);
//!
//! let docs: Vec<_> = source
//!     .fetch_all()
//!     .unwrap()
//!     .iter()
//!     .map(document_from_record)
//!     .collect();
//! assert_eq!(docs[0].len(), 3);
//! ```

use crate::document::document::Document;
use crate::document::field::{Field, FieldValue};
use crate::error::Result;

/// A typed column value in a source record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// Text column.
    Text(String),
    /// Integer column.
    Integer(i64),
    /// Floating-point column.
    Float(f64),
}

/// A flat mapping of column name to typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, RecordValue)>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Record::default()
    }

    /// Add a column (builder style).
    pub fn with_column<S: Into<String>>(mut self, name: S, value: RecordValue) -> Self {
        self.columns.push((name.into(), value));
        self
    }

    /// Get a column value by name.
    pub fn get(&self, name: &str) -> Option<&RecordValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Iterate over `(name, value)` pairs in column order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &RecordValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// A supplier of source records.
pub trait RecordSource {
    /// Fetch every record from the origin.
    fn fetch_all(&self) -> Result<Vec<Record>>;
}

/// A record source over an in-memory slice, for tests and static corpora.
#[derive(Debug, Clone, Default)]
pub struct SliceRecordSource {
    records: Vec<Record>,
}

impl SliceRecordSource {
    /// Create a source over the given records.
    pub fn new(records: Vec<Record>) -> Self {
        SliceRecordSource { records }
    }
}

impl RecordSource for SliceRecordSource {
    fn fetch_all(&self) -> Result<Vec<Record>> {
        Ok(self.records.clone())
    }
}

/// Map a record 1:1 onto a document: every column becomes an indexed and
/// stored field of the matching type.
pub fn document_from_record(record: &Record) -> Document {
    let mut doc = Document::new();
    for (name, value) in record.columns() {
        let field_value = match value {
            RecordValue::Text(text) => FieldValue::Text(text.clone()),
            RecordValue::Integer(i) => FieldValue::Integer(*i),
            RecordValue::Float(f) => FieldValue::Float(*f),
        };
        doc.add_field(Field::new(name, field_value).stored(true));
    }
    doc
}
