//! Index manifests and the generation marker.
//!
//! A committed generation is described by a JSON manifest file
//! (`gen_<N>.manifest`) listing the live segments and, per segment, the
//! deletion-bitmap generation in force. The `current.gen` marker holds the
//! number of the latest committed generation and is updated last, via a
//! temp file and an atomic rename, so readers resolve marker → manifest →
//! segment files and never observe a partially committed state.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XiphosError};
use crate::storage::{Storage, StorageOutput};

/// The name of the generation marker file at the store root.
pub const GENERATION_MARKER: &str = "current.gen";

const GENERATION_MARKER_TMP: &str = "current.gen.tmp";

/// One committed segment as recorded in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    /// Segment directory name under the store root.
    pub name: String,
    /// Number of documents in the segment (including tombstoned ones).
    pub doc_count: u32,
    /// Deletion-bitmap generation; 0 means no deletions file exists.
    pub del_gen: u64,
}

impl SegmentEntry {
    /// Path of the postings file for this segment.
    pub fn postings_file(&self) -> String {
        format!("{}/postings.bin", self.name)
    }

    /// Path of the stored-fields file for this segment.
    pub fn stored_file(&self) -> String {
        format!("{}/stored.bin", self.name)
    }

    /// Path of the numeric-index file for this segment.
    pub fn numeric_file(&self) -> String {
        format!("{}/num.bin", self.name)
    }

    /// Path of the deletion bitmap in force, if any deletions exist.
    pub fn deletes_file(&self) -> Option<String> {
        (self.del_gen > 0).then(|| deletes_file(&self.name, self.del_gen))
    }
}

/// Path of the deletion bitmap file for a segment at a given generation.
pub fn deletes_file(segment_name: &str, del_gen: u64) -> String {
    format!("{segment_name}/deleted_{del_gen:06}.bin")
}

/// The set of segments making up one committed index generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Manifest format version.
    pub version: u32,
    /// Generation number; the marker of a committed index points here.
    pub generation: u64,
    /// Next segment number to allocate.
    pub next_segment: u64,
    /// Live segments in commit order.
    pub segments: Vec<SegmentEntry>,
}

impl IndexManifest {
    /// Current manifest format version.
    pub const VERSION: u32 = 1;

    /// Create an empty manifest for a store with no commits.
    pub fn empty() -> Self {
        IndexManifest {
            version: Self::VERSION,
            generation: 0,
            next_segment: 1,
            segments: Vec::new(),
        }
    }

    /// The manifest file name for a generation.
    pub fn file_name(generation: u64) -> String {
        format!("gen_{generation:06}.manifest")
    }

    /// Read the committed generation number, if the store has one.
    pub fn read_generation(storage: &Arc<dyn Storage>) -> Result<Option<u64>> {
        if !storage.file_exists(GENERATION_MARKER) {
            return Ok(None);
        }
        let mut input = storage.open_input(GENERATION_MARKER)?;
        let mut content = String::new();
        input.read_to_string(&mut content)?;
        let generation = content.trim().parse::<u64>().map_err(|e| {
            XiphosError::corrupt(GENERATION_MARKER, format!("bad generation number: {e}"))
        })?;
        Ok(Some(generation))
    }

    /// Load the manifest for a specific generation.
    pub fn load(storage: &Arc<dyn Storage>, generation: u64) -> Result<Self> {
        let name = Self::file_name(generation);
        let mut input = storage.open_input(&name)?;
        let mut content = Vec::new();
        input.read_to_end(&mut content)?;
        let manifest: IndexManifest = serde_json::from_slice(&content)
            .map_err(|e| XiphosError::corrupt(&name, format!("bad manifest: {e}")))?;
        if manifest.generation != generation {
            return Err(XiphosError::corrupt(
                &name,
                format!(
                    "manifest declares generation {}, expected {generation}",
                    manifest.generation
                ),
            ));
        }
        Ok(manifest)
    }

    /// Load the latest committed manifest, or an empty one for a new store.
    pub fn load_latest(storage: &Arc<dyn Storage>) -> Result<Self> {
        match Self::read_generation(storage)? {
            Some(generation) => Self::load(storage, generation),
            None => Ok(Self::empty()),
        }
    }

    /// Durably publish this manifest as the current generation.
    ///
    /// Write order is the commit contract: manifest file first (synced),
    /// marker temp file next (synced), atomic rename last, directory
    /// metadata synced after. The marker update is the final change.
    pub fn commit(&self, storage: &Arc<dyn Storage>) -> Result<()> {
        let mut output = storage.create_output(&Self::file_name(self.generation))?;
        output.write_all(&serde_json::to_vec_pretty(self)?)?;
        output.close()?;

        let mut marker = storage.create_output(GENERATION_MARKER_TMP)?;
        marker.write_all(self.generation.to_string().as_bytes())?;
        marker.close()?;
        storage.rename_file(GENERATION_MARKER_TMP, GENERATION_MARKER)?;
        storage.sync_root()?;
        Ok(())
    }

    /// Every file this generation references, plus the marker itself.
    pub fn referenced_files(&self) -> HashSet<String> {
        let mut files = HashSet::new();
        files.insert(GENERATION_MARKER.to_string());
        files.insert(Self::file_name(self.generation));
        for segment in &self.segments {
            files.insert(segment.postings_file());
            files.insert(segment.stored_file());
            files.insert(segment.numeric_file());
            if let Some(deletes) = segment.deletes_file() {
                files.insert(deletes);
            }
        }
        files
    }
}
