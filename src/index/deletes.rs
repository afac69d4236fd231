//! Live/deleted bitmaps for segments.
//!
//! Deletion is a tombstone: the bitmap marks a document deleted and every
//! reader excludes it, while the postings stay in place until compaction.
//! Bitmaps are persisted generationally (`deleted_<delgen>.bin`): a commit
//! writes a new bitmap file and the manifest points at it, so the previous
//! generation keeps observing the previous bitmap.

use bit_vec::BitVec;

use crate::error::{Result, XiphosError};
use crate::storage::structured::{StructReader, StructWriter};
use crate::storage::{StorageInput, StorageOutput};

/// A per-segment deletion bitmap: one bit per local document id.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionBitmap {
    bits: BitVec,
    deleted_count: u32,
}

impl DeletionBitmap {
    /// Create a bitmap with all `doc_count` documents live.
    pub fn new(doc_count: u32) -> Self {
        DeletionBitmap {
            bits: BitVec::from_elem(doc_count as usize, false),
            deleted_count: 0,
        }
    }

    /// Number of documents covered by this bitmap.
    pub fn doc_count(&self) -> u32 {
        self.bits.len() as u32
    }

    /// Mark a document deleted. Returns true if it was live before.
    pub fn delete(&mut self, doc_id: u32) -> bool {
        match self.bits.get(doc_id as usize) {
            Some(false) => {
                self.bits.set(doc_id as usize, true);
                self.deleted_count += 1;
                true
            }
            _ => false,
        }
    }

    /// Mark every document deleted. Returns how many were live before.
    pub fn delete_all(&mut self) -> u32 {
        let newly = self.live_count();
        self.bits.set_all();
        self.deleted_count = self.doc_count();
        newly
    }

    /// Check whether a document is live.
    pub fn is_live(&self, doc_id: u32) -> bool {
        !self.bits.get(doc_id as usize).unwrap_or(true)
    }

    /// Number of deleted documents.
    pub fn deleted_count(&self) -> u32 {
        self.deleted_count
    }

    /// Number of live documents.
    pub fn live_count(&self) -> u32 {
        self.doc_count() - self.deleted_count
    }

    /// Whether any document is deleted.
    pub fn has_deletions(&self) -> bool {
        self.deleted_count > 0
    }

    /// Write this bitmap to a structured file.
    pub fn write<W: StorageOutput>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        writer.write_varint(self.doc_count() as u64)?;
        writer.write_bytes(&self.bits.to_bytes())?;
        Ok(())
    }

    /// Read a bitmap from a structured file.
    pub fn read<R: StorageInput>(reader: &mut StructReader<R>, name: &str) -> Result<Self> {
        let doc_count = reader.read_varint()? as usize;
        let bytes = reader.read_bytes()?;
        if bytes.len() * 8 < doc_count {
            return Err(XiphosError::corrupt(
                name,
                format!(
                    "bitmap holds {} bits but {} documents are declared",
                    bytes.len() * 8,
                    doc_count
                ),
            ));
        }
        let mut bits = BitVec::from_bytes(&bytes);
        bits.truncate(doc_count);
        let deleted_count = bits.iter().filter(|b| *b).count() as u32;
        Ok(DeletionBitmap {
            bits,
            deleted_count,
        })
    }
}
