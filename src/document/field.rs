//! Field types for documents.
//!
//! A [`Field`] is a named, typed value plus the policy describing what the
//! index does with it: `indexed` fields become searchable terms, `stored`
//! fields are kept verbatim for retrieval from search results. At least one
//! of the two must be set; the writer rejects fields with neither.
//!
//! # Examples
//!
//! ```
//! use xiphos::document::field::Field;
//!
//! // Full-text field, searchable and retrievable
//! let name = Field::text("bookName", "Java Programming").stored(true);
//! assert!(name.indexed);
//! assert!(name.stored);
//!
//! // Numeric field, range-searchable
//! let price = Field::f64("bookPrice", 54.5).stored(true);
//! assert_eq!(price.value.as_f64(), Some(54.5));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, XiphosError};

/// Represents a value for a field in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Text value
    Text(String),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
}

impl FieldValue {
    /// Convert to text if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the numeric value as f64, if this is a numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Text(_) => None,
        }
    }

    /// Check whether this is a numeric value.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldValue::Integer(_) | FieldValue::Float(_))
    }

    /// The textual encoding of this value, as it is indexed.
    ///
    /// Text values index their analyzed tokens; numeric values additionally
    /// index this plain textual rendering as a single token.
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// A single named field of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// The field name.
    pub name: String,
    /// The field value.
    pub value: FieldValue,
    /// Whether the field is indexed (searchable).
    pub indexed: bool,
    /// Whether the field value is stored (retrievable from search results).
    pub stored: bool,
}

impl Field {
    /// Create a new field with the given policy flags unset-by-default
    /// behavior: indexed, not stored.
    pub fn new<S: Into<String>>(name: S, value: FieldValue) -> Self {
        Field {
            name: name.into(),
            value,
            indexed: true,
            stored: false,
        }
    }

    /// Create a text field (indexed, not stored).
    pub fn text<S: Into<String>, T: Into<String>>(name: S, value: T) -> Self {
        Field::new(name, FieldValue::Text(value.into()))
    }

    /// Create an integer field (indexed, not stored).
    pub fn i64<S: Into<String>>(name: S, value: i64) -> Self {
        Field::new(name, FieldValue::Integer(value))
    }

    /// Create a float field (indexed, not stored).
    pub fn f64<S: Into<String>>(name: S, value: f64) -> Self {
        Field::new(name, FieldValue::Float(value))
    }

    /// Set whether this field is indexed.
    pub fn indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }

    /// Set whether this field is stored.
    pub fn stored(mut self, stored: bool) -> Self {
        self.stored = stored;
        self
    }

    /// Validate the field policy invariant: at least one of indexed/stored.
    pub fn validate(&self) -> Result<()> {
        if !self.indexed && !self.stored {
            return Err(XiphosError::document(format!(
                "field '{}' is neither indexed nor stored",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_defaults() {
        let field = Field::text("title", "hello");
        assert!(field.indexed);
        assert!(!field.stored);
        assert_eq!(field.value.as_text(), Some("hello"));
    }

    #[test]
    fn test_field_builder_flags() {
        let field = Field::f64("price", 90.0).stored(true).indexed(false);
        assert!(!field.indexed);
        assert!(field.stored);
        assert_eq!(field.value.as_f64(), Some(90.0));
    }

    #[test]
    fn test_field_validate() {
        let field = Field::text("title", "hello").indexed(false);
        assert!(field.validate().is_err());

        let field = Field::text("title", "hello").indexed(false).stored(true);
        assert!(field.validate().is_ok());
    }

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(FieldValue::Integer(42).as_f64(), Some(42.0));
        assert_eq!(FieldValue::Integer(42).to_text(), "42");
        assert!(FieldValue::Float(1.5).is_numeric());
        assert!(!FieldValue::Text("42".to_string()).is_numeric());
        assert_eq!(FieldValue::Text("42".to_string()).as_f64(), None);
    }
}
