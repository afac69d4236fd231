//! In-memory storage implementation.
//!
//! Fast, non-persistent storage for tests and temporary indexes. Because a
//! fresh handle over the same map observes exactly the files published so
//! far, tests also use it to simulate a crash at an arbitrary point between
//! file writes.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, XiphosError};
use crate::storage::{Storage, StorageInput, StorageLock, StorageOutput};

#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<String, Arc<Vec<u8>>>,
    locks: HashSet<String>,
}

/// An in-memory storage backend.
///
/// Cloning the handle shares the underlying file map, so a writer and any
/// number of searchers can operate on one logical store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        MemoryStorage {
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }
}

impl Storage for MemoryStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let state = self.state.lock();
        let data = state
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| XiphosError::storage(format!("file not found: {name}")))?;
        Ok(Box::new(MemoryInput {
            cursor: Cursor::new(SharedBytes(data)),
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            buffer: Vec::new(),
            state: self.state.clone(),
            closed: false,
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.state.lock().files.contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        match self.state.lock().files.remove(name) {
            Some(_) => Ok(()),
            None => Err(XiphosError::storage(format!("file not found: {name}"))),
        }
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut files: Vec<_> = self.state.lock().files.keys().cloned().collect();
        files.sort();
        Ok(files)
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut state = self.state.lock();
        let data = state
            .files
            .remove(old_name)
            .ok_or_else(|| XiphosError::storage(format!("file not found: {old_name}")))?;
        state.files.insert(new_name.to_string(), data);
        Ok(())
    }

    fn sync_root(&self) -> Result<()> {
        Ok(())
    }

    fn try_lock(&self, name: &str) -> Result<Box<dyn StorageLock>> {
        let mut state = self.state.lock();
        if !state.locks.insert(name.to_string()) {
            return Err(XiphosError::lock_held(name.to_string()));
        }
        Ok(Box::new(MemoryLock {
            name: name.to_string(),
            state: self.state.clone(),
            released: false,
        }))
    }
}

/// Shared file bytes, readable through a [`Cursor`].
#[derive(Debug)]
struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// A reader over a snapshot of an in-memory file.
#[derive(Debug)]
pub struct MemoryInput {
    cursor: Cursor<SharedBytes>,
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl StorageInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.cursor.get_ref().0.len() as u64)
    }
}

/// A writer that publishes its buffer into the file map on close.
#[derive(Debug)]
pub struct MemoryOutput {
    name: String,
    buffer: Vec<u8>,
    state: Arc<Mutex<MemoryState>>,
    closed: bool,
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.state
            .lock()
            .files
            .insert(self.name.clone(), Arc::new(self.buffer.clone()));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.flush_and_sync()?;
            self.closed = true;
        }
        Ok(())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// An in-memory advisory lock.
#[derive(Debug)]
pub struct MemoryLock {
    name: String,
    state: Arc<Mutex<MemoryState>>,
    released: bool,
}

impl StorageLock for MemoryLock {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            self.state.lock().locks.remove(&self.name);
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for MemoryLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
