//! Error types for the Xiphos library.
//!
//! All failures are represented by the [`XiphosError`] enum. Low-level I/O
//! errors are wrapped with context (operation, path) at the point where they
//! occur and surfaced to the caller; they are never swallowed.
//!
//! # Examples
//!
//! ```
//! use xiphos::error::{Result, XiphosError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(XiphosError::index("unknown segment"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Xiphos operations.
#[derive(Error, Debug)]
pub enum XiphosError {
    /// I/O errors (file operations, syncing, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Index-related errors
    #[error("Index error: {0}")]
    Index(String),

    /// Malformed document submitted to the writer
    #[error("Document error: {0}")]
    Document(String),

    /// Analysis-related errors (tokenization, filtering, etc.)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Query expression parse failure, with the byte offset of the
    /// offending token in the original input
    #[error("Parse error at offset {offset}: {message}")]
    Parse {
        /// What was wrong.
        message: String,
        /// Byte offset of the offending token in the input expression.
        offset: usize,
    },

    /// Search execution errors
    #[error("Search error: {0}")]
    Search(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// A segment file failed checksum or structural validation
    #[error("Corrupt index file {file}: {detail}")]
    Corrupt {
        /// The file that failed validation.
        file: String,
        /// What validation failed.
        detail: String,
    },

    /// The exclusive write lock is already held by another writer
    #[error("Write lock held: {0}")]
    LockHeld(String),

    /// A deadline elapsed before the operation completed
    #[error("Timeout: {0}")]
    Timeout(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with XiphosError.
pub type Result<T> = std::result::Result<T, XiphosError>;

impl XiphosError {
    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        XiphosError::Index(msg.into())
    }

    /// Create a new document error.
    pub fn document<S: Into<String>>(msg: S) -> Self {
        XiphosError::Document(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        XiphosError::Analysis(msg.into())
    }

    /// Create a new parse error at the given byte offset.
    pub fn parse<S: Into<String>>(msg: S, offset: usize) -> Self {
        XiphosError::Parse {
            message: msg.into(),
            offset,
        }
    }

    /// Create a new search error.
    pub fn search<S: Into<String>>(msg: S) -> Self {
        XiphosError::Search(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        XiphosError::Storage(msg.into())
    }

    /// Create a new corrupt-file error.
    pub fn corrupt<F: Into<String>, D: Into<String>>(file: F, detail: D) -> Self {
        XiphosError::Corrupt {
            file: file.into(),
            detail: detail.into(),
        }
    }

    /// Create a new lock-held error.
    pub fn lock_held<S: Into<String>>(msg: S) -> Self {
        XiphosError::LockHeld(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        XiphosError::Timeout(msg.into())
    }
}
