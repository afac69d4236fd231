//! Transactional index writer.
//!
//! The writer owns the store's exclusive write lock and the pending
//! in-memory buffer. Nothing a writer does is observable by searchers until
//! [`IndexWriter::commit`] publishes a new generation: segment files are
//! written and synced first, deletion bitmaps next, the manifest after that,
//! and the generation marker last. A crash anywhere in between leaves the
//! previous generation fully intact.
//!
//! Deletes are tombstones. `delete_documents` marks matching documents in
//! the pending buffer and in every committed segment; postings are only
//! physically removed by [`IndexWriter::force_merge`].

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::analysis::analyzer::Analyzer;
use crate::analysis::analyzer::standard::StandardAnalyzer;
use crate::document::document::Document;
use crate::document::field::FieldValue;
use crate::error::{Result, XiphosError};
use crate::index::deletes::DeletionBitmap;
use crate::index::manifest::{self, IndexManifest, SegmentEntry};
use crate::index::numeric;
use crate::index::posting::{PostingList, TermPostingMap};
use crate::index::segment::{NewSegment, SegmentReader, StoredFields};
use crate::index::{Term, WRITE_LOCK_NAME};
use crate::storage::structured::{StructReader, StructWriter};
use crate::storage::{Storage, StorageLock};

/// How the writer treats existing store content at open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Existing content is wholly discarded as of this writer's first commit.
    Create,
    /// Existing segments are retained and appended to.
    #[default]
    Append,
}

/// Index writer configuration.
#[derive(Clone)]
pub struct IndexWriterConfig {
    /// Analyzer for text fields. Queries must be normalized with the same
    /// analyzer, or term matching silently fails.
    pub analyzer: Arc<dyn Analyzer>,

    /// How to treat existing store content.
    pub open_mode: OpenMode,
}

impl IndexWriterConfig {
    /// Create a config with the given analyzer and the default open mode.
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        IndexWriterConfig {
            analyzer,
            open_mode: OpenMode::default(),
        }
    }

    /// Set the open mode.
    pub fn with_open_mode(mut self, open_mode: OpenMode) -> Self {
        self.open_mode = open_mode;
        self
    }
}

impl Default for IndexWriterConfig {
    fn default() -> Self {
        IndexWriterConfig {
            analyzer: Arc::new(StandardAnalyzer::new()),
            open_mode: OpenMode::default(),
        }
    }
}

impl std::fmt::Debug for IndexWriterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriterConfig")
            .field("analyzer", &self.analyzer.name())
            .field("open_mode", &self.open_mode)
            .finish()
    }
}

/// Statistics about the writing process.
#[derive(Debug, Clone, Default)]
pub struct WriterStats {
    /// Number of documents added.
    pub docs_added: u64,
    /// Number of documents tombstoned.
    pub docs_deleted: u64,
    /// Number of segments created.
    pub segments_created: u32,
}

/// A buffered, analyzed document awaiting commit.
#[derive(Debug)]
struct BufferedDoc {
    stored: StoredFields,
    numeric: Vec<(String, u64)>,
    deleted: bool,
}

/// A committed segment as the writer sees it: the reader resolves
/// delete-by-term, the working bitmap accumulates uncommitted tombstones.
struct WriterSegment {
    entry: SegmentEntry,
    reader: SegmentReader,
    deletions: DeletionBitmap,
    dirty: bool,
}

/// The transactional index writer.
///
/// Exactly one writer may hold a store open; a second open fails with
/// [`XiphosError::LockHeld`], a recoverable condition. Closing (or dropping)
/// the writer releases the lock and discards any uncommitted buffer; an
/// uncommitted buffer is never silently committed.
pub struct IndexWriter {
    storage: Arc<dyn Storage>,
    config: IndexWriterConfig,
    lock: Option<Box<dyn StorageLock>>,
    manifest: IndexManifest,
    segments: Vec<WriterSegment>,
    buffer: TermPostingMap,
    buffered_docs: Vec<BufferedDoc>,
    /// Create mode over a non-empty store must publish the discard even if
    /// nothing else is pending.
    force_commit: bool,
    closed: bool,
    stats: WriterStats,
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriter")
            .field("config", &self.config)
            .field("generation", &self.manifest.generation)
            .field("segments", &self.segments.len())
            .field("buffered_docs", &self.buffered_docs.len())
            .field("closed", &self.closed)
            .field("stats", &self.stats)
            .finish()
    }
}

impl IndexWriter {
    /// Open a writer against the store, acquiring the exclusive write lock.
    pub fn open(storage: Arc<dyn Storage>, config: IndexWriterConfig) -> Result<Self> {
        let lock = storage.try_lock(WRITE_LOCK_NAME)?;
        let latest = IndexManifest::load_latest(&storage)?;

        let (manifest, force_commit) = match config.open_mode {
            OpenMode::Create => {
                let had_content = !latest.segments.is_empty();
                // Generation and segment numbering continue from the old
                // store so discarded files can never collide with new ones.
                let manifest = IndexManifest {
                    version: IndexManifest::VERSION,
                    generation: latest.generation,
                    next_segment: latest.next_segment,
                    segments: Vec::new(),
                };
                (manifest, had_content)
            }
            OpenMode::Append => (latest, false),
        };

        let mut segments = Vec::with_capacity(manifest.segments.len());
        for entry in &manifest.segments {
            let reader = SegmentReader::open(&storage, entry)?;
            let deletions = reader.deletions().clone();
            segments.push(WriterSegment {
                entry: entry.clone(),
                reader,
                deletions,
                dirty: false,
            });
        }

        Ok(IndexWriter {
            storage,
            config,
            lock: Some(lock),
            manifest,
            segments,
            buffer: TermPostingMap::new(),
            buffered_docs: Vec::new(),
            force_commit,
            closed: false,
            stats: WriterStats::default(),
        })
    }

    /// Add a document to the pending buffer.
    ///
    /// Indexed fields are analyzed into postings, stored fields are kept
    /// verbatim, numeric fields additionally feed the sortable numeric
    /// index. The document is invisible to every searcher until commit.
    /// Returns the buffer-local id assigned to the document.
    pub fn add_document(&mut self, doc: Document) -> Result<u64> {
        self.check_closed()?;

        for field in doc.fields() {
            field.validate()?;
        }

        let doc_id = self.buffered_docs.len() as u32;
        let mut stored = StoredFields::new();
        let mut numeric_entries = Vec::new();

        for field in doc.fields() {
            if field.indexed {
                match &field.value {
                    FieldValue::Text(text) => {
                        for token in self.config.analyzer.analyze(text)? {
                            self.buffer.add_occurrence(
                                Term::new(field.name.clone(), token.text),
                                doc_id,
                                token.position,
                            );
                        }
                    }
                    // Numeric fields index their textual rendering as a
                    // single token plus a sortable encoded key.
                    FieldValue::Integer(i) => {
                        self.buffer.add_occurrence(
                            Term::new(field.name.clone(), i.to_string()),
                            doc_id,
                            0,
                        );
                        numeric_entries
                            .push((field.name.clone(), numeric::encode_f64(*i as f64)));
                    }
                    FieldValue::Float(f) => {
                        self.buffer.add_occurrence(
                            Term::new(field.name.clone(), f.to_string()),
                            doc_id,
                            0,
                        );
                        numeric_entries.push((field.name.clone(), numeric::encode_f64(*f)));
                    }
                }
            }
            if field.stored {
                stored.push(field.name.clone(), field.value.clone());
            }
        }

        self.buffered_docs.push(BufferedDoc {
            stored,
            numeric: numeric_entries,
            deleted: false,
        });
        self.stats.docs_added += 1;
        Ok(doc_id as u64)
    }

    /// Tombstone every live document whose postings match `term` exactly,
    /// across the pending buffer and all committed segments. Returns the
    /// number of documents newly marked; calling twice is idempotent.
    pub fn delete_documents(&mut self, term: &Term) -> Result<u64> {
        self.check_closed()?;

        let mut count = 0u64;

        if let Some(list) = self.buffer.get(term) {
            let matched: Vec<u32> = list.iter().map(|p| p.doc_id).collect();
            for doc_id in matched {
                let doc = &mut self.buffered_docs[doc_id as usize];
                if !doc.deleted {
                    doc.deleted = true;
                    count += 1;
                }
            }
        }

        for segment in &mut self.segments {
            if let Some(list) = segment.reader.postings(term) {
                for posting in list.iter() {
                    if segment.deletions.delete(posting.doc_id) {
                        segment.dirty = true;
                        count += 1;
                    }
                }
            }
        }

        self.stats.docs_deleted += count;
        Ok(count)
    }

    /// Tombstone every live document. Analyzer and configuration state are
    /// untouched.
    pub fn delete_all(&mut self) -> Result<()> {
        self.check_closed()?;

        let mut count = 0u64;
        for doc in &mut self.buffered_docs {
            if !doc.deleted {
                doc.deleted = true;
                count += 1;
            }
        }
        for segment in &mut self.segments {
            let newly = segment.deletions.delete_all() as u64;
            if newly > 0 {
                segment.dirty = true;
                count += newly;
            }
        }
        self.stats.docs_deleted += count;
        Ok(())
    }

    /// Replace the documents matching a key term: delete-by-term, then add
    /// the replacement. Both become visible together at the next commit.
    pub fn update_document(&mut self, term: &Term, doc: Document) -> Result<u64> {
        self.delete_documents(term)?;
        self.add_document(doc)
    }

    /// Durably publish all pending adds and deletes as a new generation.
    ///
    /// No-ops when nothing is pending. On return the new generation is
    /// durable; a crash before return leaves the previous generation.
    pub fn commit(&mut self) -> Result<()> {
        self.check_closed()?;

        let has_new_docs = self.buffered_docs.iter().any(|d| !d.deleted);
        let has_deletes = self.segments.iter().any(|s| s.dirty);
        if !has_new_docs && !has_deletes && !self.force_commit {
            // Discard tombstoned-in-buffer docs that never became visible.
            self.buffered_docs.clear();
            self.buffer.clear();
            return Ok(());
        }

        let mut next_manifest = IndexManifest {
            version: IndexManifest::VERSION,
            generation: self.manifest.generation + 1,
            next_segment: self.manifest.next_segment,
            segments: Vec::new(),
        };

        // New deletion-bitmap generations for segments with fresh tombstones.
        for segment in &self.segments {
            let mut entry = segment.entry.clone();
            if segment.dirty {
                entry.del_gen += 1;
                let file = manifest::deletes_file(&entry.name, entry.del_gen);
                let output = self.storage.create_output(&file)?;
                let mut writer = StructWriter::new(output);
                segment.deletions.write(&mut writer)?;
                writer.close()?;
            }
            next_manifest.segments.push(entry);
        }

        // Flush live buffered documents into a new segment.
        let new_segment = if has_new_docs {
            let name = format!("seg_{:06}", next_manifest.next_segment);
            next_manifest.next_segment += 1;

            let (segment, doc_count) = self.build_segment()?;
            segment.write(&self.storage, &name)?;

            let entry = SegmentEntry {
                name,
                doc_count,
                del_gen: 0,
            };
            next_manifest.segments.push(entry.clone());
            Some(entry)
        } else {
            None
        };

        // The marker update inside is the commit point.
        next_manifest.commit(&self.storage)?;

        // Visible state advanced; align the writer with it.
        for segment in &mut self.segments {
            if segment.dirty {
                segment.entry.del_gen += 1;
                segment.dirty = false;
            }
        }
        if let Some(entry) = new_segment {
            let reader = SegmentReader::open(&self.storage, &entry)?;
            let deletions = reader.deletions().clone();
            self.segments.push(WriterSegment {
                entry,
                reader,
                deletions,
                dirty: false,
            });
            self.stats.segments_created += 1;
        }
        self.manifest = next_manifest;
        self.buffer.clear();
        self.buffered_docs.clear();
        self.force_commit = false;

        self.purge_unreferenced()?;
        Ok(())
    }

    /// Assemble the pending buffer into segment content, dropping buffered
    /// tombstones and renumbering the survivors densely.
    fn build_segment(&mut self) -> Result<(NewSegment, u32)> {
        let mut remap: Vec<Option<u32>> = Vec::with_capacity(self.buffered_docs.len());
        let mut next_id = 0u32;
        for doc in &self.buffered_docs {
            if doc.deleted {
                remap.push(None);
            } else {
                remap.push(Some(next_id));
                next_id += 1;
            }
        }

        let buffer = std::mem::take(&mut self.buffer);
        let postings = buffer.into_sorted_remapped(|doc_id| remap[doc_id as usize]);

        let mut stored = Vec::with_capacity(next_id as usize);
        let mut numeric: BTreeMap<String, Vec<(u64, u32)>> = BTreeMap::new();
        for (doc, mapped) in self.buffered_docs.iter().zip(&remap) {
            let Some(new_id) = mapped else { continue };
            stored.push(doc.stored.clone());
            for (field, encoded) in &doc.numeric {
                numeric
                    .entry(field.clone())
                    .or_default()
                    .push((*encoded, *new_id));
            }
        }
        for entries in numeric.values_mut() {
            entries.sort_unstable();
        }

        Ok((
            NewSegment {
                postings,
                stored,
                numeric,
            },
            next_id,
        ))
    }

    /// Compact all live documents into a single segment, physically dropping
    /// tombstoned documents and their postings. Pending changes are
    /// committed first; the compacted generation replaces everything.
    pub fn force_merge(&mut self) -> Result<()> {
        self.check_closed()?;
        self.commit()?;

        let needs_merge = self.segments.len() > 1
            || self
                .segments
                .first()
                .is_some_and(|s| s.deletions.has_deletions());
        if !needs_merge {
            return Ok(());
        }

        // Renumber live documents densely across segments in commit order.
        let mut merged = NewSegment::default();
        let mut merged_postings: BTreeMap<Term, PostingList> = BTreeMap::new();
        let mut numeric: BTreeMap<String, Vec<(u64, u32)>> = BTreeMap::new();
        let mut next_id = 0u32;

        for segment in &self.segments {
            let mut local_map: Vec<Option<u32>> =
                Vec::with_capacity(segment.reader.doc_count() as usize);
            for local in 0..segment.reader.doc_count() {
                if segment.deletions.is_live(local) {
                    local_map.push(Some(next_id));
                    let stored = segment.reader.stored(local).ok_or_else(|| {
                        XiphosError::index(format!(
                            "segment {} has no stored fields for document {local}",
                            segment.entry.name
                        ))
                    })?;
                    merged.stored.push(stored.clone());
                    next_id += 1;
                } else {
                    local_map.push(None);
                }
            }

            for (term, list) in segment.reader.postings_iter() {
                let target = merged_postings.entry(term.clone()).or_default();
                for posting in list.iter() {
                    if let Some(new_id) = local_map[posting.doc_id as usize] {
                        let mut remapped = posting.clone();
                        remapped.doc_id = new_id;
                        target.push(remapped);
                    }
                }
            }

            for (field, entries) in segment.reader.numeric_iter() {
                let target = numeric.entry(field.to_string()).or_default();
                for &(encoded, local) in entries {
                    if let Some(new_id) = local_map[local as usize] {
                        target.push((encoded, new_id));
                    }
                }
            }
        }

        merged.postings = merged_postings
            .into_iter()
            .filter(|(_, list)| !list.is_empty())
            .collect();
        for entries in numeric.values_mut() {
            entries.sort_unstable();
        }
        merged.numeric = numeric;

        let mut next_manifest = IndexManifest {
            version: IndexManifest::VERSION,
            generation: self.manifest.generation + 1,
            next_segment: self.manifest.next_segment + 1,
            segments: Vec::new(),
        };
        let name = format!("seg_{:06}", self.manifest.next_segment);
        merged.write(&self.storage, &name)?;
        let entry = SegmentEntry {
            name,
            doc_count: next_id,
            del_gen: 0,
        };
        next_manifest.segments.push(entry.clone());
        next_manifest.commit(&self.storage)?;

        let reader = SegmentReader::open(&self.storage, &entry)?;
        let deletions = reader.deletions().clone();
        self.segments = vec![WriterSegment {
            entry,
            reader,
            deletions,
            dirty: false,
        }];
        self.manifest = next_manifest;
        self.stats.segments_created += 1;

        self.purge_unreferenced()?;
        Ok(())
    }

    /// Remove index files no longer referenced by the current generation.
    ///
    /// A searcher that read the marker just before it advanced can lose the
    /// race and find its manifest gone; opening retries against the fresh
    /// marker, so nothing here needs to survive.
    fn purge_unreferenced(&self) -> Result<()> {
        let mut keep = self.manifest.referenced_files();
        keep.insert(WRITE_LOCK_NAME.to_string());

        for file in self.storage.list_files()? {
            if keep.contains(&file) {
                continue;
            }
            let ours = file.starts_with("seg_")
                || file.starts_with("gen_")
                || file == "current.gen.tmp";
            if ours {
                self.storage.delete_file(&file)?;
            }
        }
        Ok(())
    }

    /// Discard the pending buffer and uncommitted tombstones.
    pub fn rollback(&mut self) -> Result<()> {
        self.check_closed()?;

        self.buffer.clear();
        self.buffered_docs.clear();
        for segment in &mut self.segments {
            if segment.dirty {
                segment.deletions = segment.reader.deletions().clone();
                // Re-apply tombstones committed by this writer after open.
                if segment.entry.del_gen > 0 {
                    let file = manifest::deletes_file(&segment.entry.name, segment.entry.del_gen);
                    if self.storage.file_exists(&file) {
                        let input = self.storage.open_input(&file)?;
                        let mut reader = StructReader::new(input, &file)?;
                        segment.deletions = DeletionBitmap::read(&mut reader, &file)?;
                        reader.verify_checksum()?;
                    }
                }
                segment.dirty = false;
            }
        }
        Ok(())
    }

    /// Number of live documents waiting in the buffer.
    pub fn pending_docs(&self) -> usize {
        self.buffered_docs.iter().filter(|d| !d.deleted).count()
    }

    /// Get writer statistics.
    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// Check if the writer is closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the writer and release the exclusive write lock.
    ///
    /// Any uncommitted buffer is discarded, never silently committed.
    pub fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.buffer.clear();
            self.buffered_docs.clear();
            if let Some(mut lock) = self.lock.take() {
                lock.release()?;
            }
            self.closed = true;
        }
        Ok(())
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            Err(XiphosError::index("writer is closed"))
        } else {
            Ok(())
        }
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
