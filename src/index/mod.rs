//! Inverted index store: segments, manifests, and the transactional writer.
//!
//! An index is a generation-ordered sequence of immutable [`segment`]s plus
//! the writer's pending in-memory buffer. Each commit publishes a new
//! generation: segment files first, the generation marker last, so a crash
//! at any point leaves either the old or the new state fully visible.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod deletes;
pub mod manifest;
pub mod numeric;
pub mod posting;
pub mod segment;
pub mod writer;

pub use writer::{IndexWriter, IndexWriterConfig, OpenMode, WriterStats};

/// The name of the writer's exclusive lock file at the store root.
pub const WRITE_LOCK_NAME: &str = "write.lock";

/// A term is the atomic unit of the inverted index: a field name plus a
/// normalized token. Equality is exact string match after analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Term {
    /// The field the token was indexed under.
    pub field: String,
    /// The normalized token text.
    pub text: String,
}

impl Term {
    /// Create a new term.
    pub fn new<F, T>(field: F, text: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        Term {
            field: field.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.text)
    }
}
