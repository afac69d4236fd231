//! Document model: fields with per-field indexing and storage policy.

pub mod document;
pub mod field;

pub use document::{Document, DocumentBuilder};
pub use field::{Field, FieldValue};
