//! Document structure: the unit of indexing.
//!
//! A [`Document`] is an ordered set of named [`Field`]s. Field names are
//! unique within a document; adding a field with an existing name replaces
//! the previous one (last write wins). Documents are built by the caller and
//! become immutable once submitted to the index writer.

use crate::document::field::{Field, FieldValue};

/// A document represents a single item to be indexed.
///
/// # Examples
///
/// ```
/// use xiphos::document::document::Document;
///
/// let doc = Document::builder()
///     .add_text("bookName", "Java Programming")
///     .add_f64("bookPrice", 71.5)
///     .build();
///
/// assert_eq!(doc.len(), 2);
/// assert!(doc.get_field("bookName").is_some());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Document {
    /// The fields of this document, in insertion order.
    fields: Vec<Field>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Document { fields: Vec::new() }
    }

    /// Add a field to the document. Last write wins on duplicate names.
    pub fn add_field(&mut self, field: Field) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == field.name) {
            *existing = field;
        } else {
            self.fields.push(field);
        }
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check if the document has a field.
    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// Get all fields in insertion order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Create a builder for constructing documents.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }
}

/// A builder for constructing documents in a fluent manner.
///
/// Convenience methods create fields that are both indexed and stored, the
/// common case for record-backed documents. Use [`DocumentBuilder::add_field`]
/// for other policies.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    /// Create a new document builder.
    pub fn new() -> Self {
        DocumentBuilder {
            document: Document::new(),
        }
    }

    /// Add an indexed and stored text field.
    pub fn add_text<S: Into<String>, T: Into<String>>(mut self, name: S, value: T) -> Self {
        self.document
            .add_field(Field::text(name, value).stored(true));
        self
    }

    /// Add an indexed and stored integer field.
    pub fn add_i64<S: Into<String>>(mut self, name: S, value: i64) -> Self {
        self.document.add_field(Field::i64(name, value).stored(true));
        self
    }

    /// Add an indexed and stored float field.
    pub fn add_f64<S: Into<String>>(mut self, name: S, value: f64) -> Self {
        self.document.add_field(Field::f64(name, value).stored(true));
        self
    }

    /// Add a field with explicit policy flags.
    pub fn add_field(mut self, field: Field) -> Self {
        self.document.add_field(field);
        self
    }

    /// Build the final document.
    pub fn build(self) -> Document {
        self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_builder() {
        let doc = Document::builder()
            .add_text("title", "hello world")
            .add_i64("year", 2018)
            .add_f64("price", 56.0)
            .build();

        assert_eq!(doc.len(), 3);
        assert!(doc.has_field("title"));
        assert_eq!(
            doc.get_field("year").unwrap().value,
            FieldValue::Integer(2018)
        );
    }

    #[test]
    fn test_last_write_wins() {
        let mut doc = Document::new();
        doc.add_field(Field::text("title", "first"));
        doc.add_field(Field::text("title", "second"));

        assert_eq!(doc.len(), 1);
        assert_eq!(
            doc.get_field("title").unwrap().value.as_text(),
            Some("second")
        );
    }

    #[test]
    fn test_insertion_order_preserved() {
        let doc = Document::builder()
            .add_text("b", "1")
            .add_text("a", "2")
            .build();

        let names: Vec<_> = doc.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_builder_fields_indexed_and_stored() {
        let doc = Document::builder().add_text("title", "hello").build();
        let field = doc.get_field("title").unwrap();
        assert!(field.indexed);
        assert!(field.stored);
    }
}
