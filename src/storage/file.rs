//! File-based storage implementation.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, XiphosError};
use crate::storage::{Storage, StorageInput, StorageLock, StorageOutput};

/// A file-based storage rooted at a directory.
///
/// Writes go through a [`BufWriter`]; [`StorageOutput::flush_and_sync`] calls
/// `File::sync_all`, so data acknowledged by a commit survives process
/// restart. Renames map to `fs::rename`, which is atomic within one
/// filesystem.
#[derive(Debug)]
pub struct FileStorage {
    /// The root directory for storage.
    directory: PathBuf,
}

impl FileStorage {
    /// Create a file storage in the given directory, creating it if needed.
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        if !directory.exists() {
            fs::create_dir_all(&directory).map_err(|e| {
                XiphosError::storage(format!(
                    "failed to create directory {}: {e}",
                    directory.display()
                ))
            })?;
        }

        if !directory.is_dir() {
            return Err(XiphosError::storage(format!(
                "path is not a directory: {}",
                directory.display()
            )));
        }

        Ok(FileStorage { directory })
    }

    /// The root directory of this storage.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Resolve a relative file name, rejecting escapes from the root.
    fn file_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(XiphosError::storage(format!(
                "invalid file name: {name}"
            )));
        }
        Ok(self.directory.join(relative))
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let path = self.file_path(name)?;
        let file = File::open(&path).map_err(|e| {
            XiphosError::storage(format!("failed to open {}: {e}", path.display()))
        })?;
        Ok(Box::new(FileInput::new(file)?))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let path = self.file_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                XiphosError::storage(format!(
                    "failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| {
                XiphosError::storage(format!("failed to create {}: {e}", path.display()))
            })?;
        Ok(Box::new(FileOutput::new(file)))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        let path = self.file_path(name)?;
        fs::remove_file(&path).map_err(|e| {
            XiphosError::storage(format!("failed to delete {}: {e}", path.display()))
        })?;
        // Prune the parent directory if the delete emptied it.
        if let Some(parent) = path.parent()
            && parent != self.directory
        {
            let _ = fs::remove_dir(parent);
        }
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.is_dir() {
                    walk(root, &path, out)?;
                } else if let Ok(relative) = path.strip_prefix(root) {
                    out.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
            Ok(())
        }

        let mut files = Vec::new();
        walk(&self.directory, &self.directory, &mut files).map_err(|e| {
            XiphosError::storage(format!(
                "failed to list {}: {e}",
                self.directory.display()
            ))
        })?;
        files.sort();
        Ok(files)
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        let old_path = self.file_path(old_name)?;
        let new_path = self.file_path(new_name)?;
        fs::rename(&old_path, &new_path).map_err(|e| {
            XiphosError::storage(format!(
                "failed to rename {} to {}: {e}",
                old_path.display(),
                new_path.display()
            ))
        })
    }

    fn sync_root(&self) -> Result<()> {
        // Sync directory metadata so renames within it are durable.
        #[cfg(unix)]
        {
            let dir = File::open(&self.directory).map_err(|e| {
                XiphosError::storage(format!(
                    "failed to open directory {}: {e}",
                    self.directory.display()
                ))
            })?;
            dir.sync_all().map_err(|e| {
                XiphosError::storage(format!(
                    "failed to sync directory {}: {e}",
                    self.directory.display()
                ))
            })?;
        }
        Ok(())
    }

    fn try_lock(&self, name: &str) -> Result<Box<dyn StorageLock>> {
        let path = self.file_path(name)?;
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_file) => Ok(Box::new(FileLock {
                name: name.to_string(),
                path,
                released: false,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(
                XiphosError::lock_held(format!("{} exists at {}", name, path.display())),
            ),
            Err(e) => Err(XiphosError::storage(format!(
                "failed to acquire lock {}: {e}",
                path.display()
            ))),
        }
    }
}

/// A buffered reader over a storage file.
#[derive(Debug)]
pub struct FileInput {
    reader: BufReader<File>,
    size: u64,
}

impl FileInput {
    fn new(file: File) -> Result<Self> {
        let size = file
            .metadata()
            .map_err(|e| XiphosError::storage(format!("failed to stat file: {e}")))?
            .len();
        Ok(FileInput {
            reader: BufReader::new(file),
            size,
        })
    }
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }
}

/// A buffered, syncable writer over a storage file.
#[derive(Debug)]
pub struct FileOutput {
    writer: BufWriter<File>,
    closed: bool,
}

impl FileOutput {
    fn new(file: File) -> Self {
        FileOutput {
            writer: BufWriter::new(file),
            closed: false,
        }
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| XiphosError::storage(format!("failed to flush file: {e}")))?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| XiphosError::storage(format!("failed to sync file: {e}")))?;
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

/// A lock backed by a `create_new` lock file; releasing deletes the file.
#[derive(Debug)]
pub struct FileLock {
    name: String,
    path: PathBuf,
    released: bool,
}

impl StorageLock for FileLock {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            fs::remove_file(&self.path).map_err(|e| {
                XiphosError::storage(format!(
                    "failed to release lock {}: {e}",
                    self.path.display()
                ))
            })?;
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_read_nested_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        let mut output = storage.create_output("seg_000001/postings.bin").unwrap();
        output.write_all(b"hello").unwrap();
        output.close().unwrap();

        assert!(storage.file_exists("seg_000001/postings.bin"));

        let mut input = storage.open_input("seg_000001/postings.bin").unwrap();
        let mut buf = Vec::new();
        input.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello");
    }

    #[test]
    fn test_list_files_recursive() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        storage.create_output("a.bin").unwrap().close().unwrap();
        storage
            .create_output("seg_000001/b.bin")
            .unwrap()
            .close()
            .unwrap();

        let files = storage.list_files().unwrap();
        assert_eq!(files, vec!["a.bin", "seg_000001/b.bin"]);
    }

    #[test]
    fn test_rename_is_replace() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        let mut out = storage.create_output("gen.tmp").unwrap();
        out.write_all(b"2").unwrap();
        out.close().unwrap();
        let mut out = storage.create_output("current.gen").unwrap();
        out.write_all(b"1").unwrap();
        out.close().unwrap();

        storage.rename_file("gen.tmp", "current.gen").unwrap();

        let mut input = storage.open_input("current.gen").unwrap();
        let mut buf = String::new();
        input.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "2");
        assert!(!storage.file_exists("gen.tmp"));
    }

    #[test]
    fn test_lock_exclusion_and_release() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        let lock = storage.try_lock("write.lock").unwrap();
        assert!(matches!(
            storage.try_lock("write.lock"),
            Err(XiphosError::LockHeld(_))
        ));

        drop(lock);
        let _relock = storage.try_lock("write.lock").unwrap();
    }

    #[test]
    fn test_rejects_escaping_names() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        assert!(storage.open_input("../outside").is_err());
    }
}
