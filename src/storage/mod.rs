//! Storage abstraction layer.
//!
//! The store is an explicit handle (`Arc<dyn Storage>`) passed to the index
//! writer and searcher constructors. File and memory backends can be swapped
//! without touching higher-level code; the memory backend doubles as the
//! crash-simulation harness in tests.
//!
//! File names are paths relative to the storage root and may contain `/`
//! separators; the index keeps one subdirectory per segment.
//!
//! # Example
//!
//! ```
//! use std::io::{Read, Write};
//!
//! use xiphos::storage::{Storage, StorageOutput};
//! use xiphos::storage::memory::MemoryStorage;
//!
//! # fn main() -> xiphos::error::Result<()> {
//! let storage = MemoryStorage::new();
//!
//! let mut output = storage.create_output("seg_000001/postings.bin")?;
//! output.write_all(b"test data")?;
//! output.close()?;
//!
//! let mut input = storage.open_input("seg_000001/postings.bin")?;
//! let mut buffer = Vec::new();
//! input.read_to_end(&mut buffer)?;
//! assert_eq!(buffer, b"test data");
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Seek, Write};

use crate::error::Result;

pub mod file;
pub mod memory;
pub mod structured;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// A trait for storage backends that can store and retrieve named files.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open an existing file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create a file for writing, truncating any existing content.
    ///
    /// Intermediate directories in `name` are created as needed.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files, as paths relative to the storage root.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Atomically replace `new_name` with `old_name`.
    ///
    /// This is the primitive commit relies on for the generation marker:
    /// after the call, readers observe either the old content or the new,
    /// never a partial write.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Durably sync the storage root itself (directory metadata).
    fn sync_root(&self) -> Result<()>;

    /// Try to acquire an exclusive advisory lock with the given name.
    ///
    /// Fails with [`XiphosError::LockHeld`](crate::error::XiphosError) if the
    /// lock is already held, by this process or another. The lock is released
    /// by [`StorageLock::release`] or when the guard is dropped.
    fn try_lock(&self, name: &str) -> Result<Box<dyn StorageLock>>;
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    /// Get the total size of the input in bytes.
    fn size(&self) -> Result<u64>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush buffered data and sync it to durable storage.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Flush, sync, and close the output.
    fn close(&mut self) -> Result<()>;
}

/// An exclusive advisory lock held against a storage backend.
///
/// Dropping the guard releases the lock on every exit path.
pub trait StorageLock: Send + std::fmt::Debug {
    /// The name of this lock.
    fn name(&self) -> &str;

    /// Release the lock explicitly.
    fn release(&mut self) -> Result<()>;
}

// Allow trait objects to be used where the traits are expected.
impl StorageInput for Box<dyn StorageInput> {
    fn size(&self) -> Result<u64> {
        (**self).size()
    }
}

impl StorageOutput for Box<dyn StorageOutput> {
    fn flush_and_sync(&mut self) -> Result<()> {
        (**self).flush_and_sync()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
