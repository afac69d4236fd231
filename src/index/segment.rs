//! Immutable index segments: writing and reading.
//!
//! A segment directory holds three structured files, each with a trailing
//! checksum:
//!
//! - `postings.bin`: sorted term dictionary with inline posting lists
//! - `stored.bin`: stored field values, dense by local document id
//! - `num.bin`: per-field sorted `(encoded value, doc)` numeric index
//!
//! plus zero or more `deleted_<delgen>.bin` bitmap generations, written by
//! later commits that tombstone documents in this segment. Readers verify
//! every checksum at open; a corrupt file fails the open, it is never
//! skipped.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::document::field::FieldValue;
use crate::error::{Result, XiphosError};
use crate::index::Term;
use crate::index::deletes::DeletionBitmap;
use crate::index::manifest::SegmentEntry;
use crate::index::posting::PostingList;
use crate::storage::Storage;
use crate::storage::structured::{StructReader, StructWriter};

// Type tags in stored.bin.
const TAG_TEXT: u8 = 0;
const TAG_INTEGER: u8 = 1;
const TAG_FLOAT: u8 = 2;

/// The stored (retrievable) fields of one document, in field insertion
/// order, exactly as submitted at index time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredFields {
    fields: Vec<(String, FieldValue)>,
}

impl StoredFields {
    /// Create an empty stored-fields set.
    pub fn new() -> Self {
        StoredFields::default()
    }

    /// Append a stored field value.
    pub fn push<S: Into<String>>(&mut self, name: S, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    /// Get a stored value by field name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of stored fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check whether no fields are stored.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The fully-built content of a segment about to be written.
#[derive(Debug, Default)]
pub struct NewSegment {
    /// `(term, posting list)` pairs sorted by term.
    pub postings: Vec<(Term, PostingList)>,
    /// Stored fields, dense by local document id.
    pub stored: Vec<StoredFields>,
    /// Per numeric field, `(encoded value, doc)` pairs sorted ascending.
    pub numeric: BTreeMap<String, Vec<(u64, u32)>>,
}

impl NewSegment {
    /// Number of documents in this segment.
    pub fn doc_count(&self) -> u32 {
        self.stored.len() as u32
    }

    /// Write the segment files under `name/`. Every file is synced before
    /// this returns; the segment stays invisible until a manifest commit
    /// references it.
    pub fn write(&self, storage: &Arc<dyn Storage>, name: &str) -> Result<()> {
        self.write_postings(storage, name)?;
        self.write_stored(storage, name)?;
        self.write_numeric(storage, name)?;
        Ok(())
    }

    fn write_postings(&self, storage: &Arc<dyn Storage>, name: &str) -> Result<()> {
        let output = storage.create_output(&format!("{name}/postings.bin"))?;
        let mut writer = StructWriter::new(output);

        writer.write_varint(self.postings.len() as u64)?;
        for (term, posting_list) in &self.postings {
            writer.write_string(&term.field)?;
            writer.write_string(&term.text)?;
            posting_list.encode(&mut writer)?;
        }
        writer.close()
    }

    fn write_stored(&self, storage: &Arc<dyn Storage>, name: &str) -> Result<()> {
        let output = storage.create_output(&format!("{name}/stored.bin"))?;
        let mut writer = StructWriter::new(output);

        writer.write_varint(self.stored.len() as u64)?;
        for stored in &self.stored {
            writer.write_varint(stored.len() as u64)?;
            for (field_name, value) in stored.iter() {
                writer.write_string(field_name)?;
                match value {
                    FieldValue::Text(text) => {
                        writer.write_u8(TAG_TEXT)?;
                        writer.write_string(text)?;
                    }
                    FieldValue::Integer(i) => {
                        writer.write_u8(TAG_INTEGER)?;
                        writer.write_u64(*i as u64)?;
                    }
                    FieldValue::Float(f) => {
                        writer.write_u8(TAG_FLOAT)?;
                        writer.write_f64(*f)?;
                    }
                }
            }
        }
        writer.close()
    }

    fn write_numeric(&self, storage: &Arc<dyn Storage>, name: &str) -> Result<()> {
        let output = storage.create_output(&format!("{name}/num.bin"))?;
        let mut writer = StructWriter::new(output);

        writer.write_varint(self.numeric.len() as u64)?;
        for (field_name, entries) in &self.numeric {
            writer.write_string(field_name)?;
            writer.write_varint(entries.len() as u64)?;
            for &(encoded, doc_id) in entries {
                writer.write_u64(encoded)?;
                writer.write_varint(doc_id as u64)?;
            }
        }
        writer.close()
    }
}

/// An open, fully-loaded segment.
///
/// All files are read and checksum-verified at open time; lookups afterwards
/// never touch storage, which is what makes searcher snapshots immune to
/// concurrent commits and file purges.
#[derive(Debug)]
pub struct SegmentReader {
    name: String,
    postings: BTreeMap<Term, PostingList>,
    stored: Vec<StoredFields>,
    numeric: HashMap<String, Vec<(u64, u32)>>,
    deletions: DeletionBitmap,
}

impl SegmentReader {
    /// Open the segment described by a manifest entry.
    pub fn open(storage: &Arc<dyn Storage>, entry: &SegmentEntry) -> Result<Self> {
        let postings = Self::read_postings(storage, entry)?;
        let stored = Self::read_stored(storage, entry)?;
        let numeric = Self::read_numeric(storage, entry)?;

        if stored.len() as u32 != entry.doc_count {
            return Err(XiphosError::corrupt(
                entry.stored_file(),
                format!(
                    "segment declares {} documents but stores {}",
                    entry.doc_count,
                    stored.len()
                ),
            ));
        }

        let deletions = match entry.deletes_file() {
            Some(file) => {
                let input = storage.open_input(&file)?;
                let mut reader = StructReader::new(input, &file)?;
                let bitmap = DeletionBitmap::read(&mut reader, &file)?;
                reader.verify_checksum()?;
                if bitmap.doc_count() != entry.doc_count {
                    return Err(XiphosError::corrupt(
                        &file,
                        format!(
                            "bitmap covers {} documents, segment has {}",
                            bitmap.doc_count(),
                            entry.doc_count
                        ),
                    ));
                }
                bitmap
            }
            None => DeletionBitmap::new(entry.doc_count),
        };

        Ok(SegmentReader {
            name: entry.name.clone(),
            postings,
            stored,
            numeric,
            deletions,
        })
    }

    fn read_postings(
        storage: &Arc<dyn Storage>,
        entry: &SegmentEntry,
    ) -> Result<BTreeMap<Term, PostingList>> {
        let file = entry.postings_file();
        let input = storage.open_input(&file)?;
        let mut reader = StructReader::new(input, &file)?;

        let term_count = reader.read_varint()? as usize;
        let mut postings = BTreeMap::new();
        for _ in 0..term_count {
            let field = reader.read_string()?;
            let text = reader.read_string()?;
            let list = PostingList::decode(&mut reader)?;
            postings.insert(Term::new(field, text), list);
        }
        reader.verify_checksum()?;
        Ok(postings)
    }

    fn read_stored(
        storage: &Arc<dyn Storage>,
        entry: &SegmentEntry,
    ) -> Result<Vec<StoredFields>> {
        let file = entry.stored_file();
        let input = storage.open_input(&file)?;
        let mut reader = StructReader::new(input, &file)?;

        let doc_count = reader.read_varint()? as usize;
        let mut stored = Vec::with_capacity(doc_count);
        for _ in 0..doc_count {
            let field_count = reader.read_varint()? as usize;
            let mut fields = StoredFields::new();
            for _ in 0..field_count {
                let field_name = reader.read_string()?;
                let value = match reader.read_u8()? {
                    TAG_TEXT => FieldValue::Text(reader.read_string()?),
                    TAG_INTEGER => FieldValue::Integer(reader.read_u64()? as i64),
                    TAG_FLOAT => FieldValue::Float(reader.read_f64()?),
                    tag => {
                        return Err(XiphosError::corrupt(
                            &file,
                            format!("unknown stored value tag {tag}"),
                        ));
                    }
                };
                fields.push(field_name, value);
            }
            stored.push(fields);
        }
        reader.verify_checksum()?;
        Ok(stored)
    }

    fn read_numeric(
        storage: &Arc<dyn Storage>,
        entry: &SegmentEntry,
    ) -> Result<HashMap<String, Vec<(u64, u32)>>> {
        let file = entry.numeric_file();
        let input = storage.open_input(&file)?;
        let mut reader = StructReader::new(input, &file)?;

        let field_count = reader.read_varint()? as usize;
        let mut numeric = HashMap::with_capacity(field_count);
        for _ in 0..field_count {
            let field_name = reader.read_string()?;
            let entry_count = reader.read_varint()? as usize;
            let mut entries = Vec::with_capacity(entry_count);
            for _ in 0..entry_count {
                let encoded = reader.read_u64()?;
                let doc_id = reader.read_varint()? as u32;
                entries.push((encoded, doc_id));
            }
            numeric.insert(field_name, entries);
        }
        reader.verify_checksum()?;
        Ok(numeric)
    }

    /// The segment directory name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total documents, including tombstoned ones.
    pub fn doc_count(&self) -> u32 {
        self.stored.len() as u32
    }

    /// Documents not tombstoned by the bitmap in force.
    pub fn live_count(&self) -> u32 {
        self.deletions.live_count()
    }

    /// Whether a local document id is live.
    pub fn is_live(&self, doc_id: u32) -> bool {
        self.deletions.is_live(doc_id)
    }

    /// The deletion bitmap in force for this reader's generation.
    pub fn deletions(&self) -> &DeletionBitmap {
        &self.deletions
    }

    /// Look up the posting list for a term.
    pub fn postings(&self, term: &Term) -> Option<&PostingList> {
        self.postings.get(term)
    }

    /// Raw document frequency of a term (tombstones included).
    pub fn doc_frequency(&self, term: &Term) -> u64 {
        self.postings
            .get(term)
            .map(|list| list.doc_frequency())
            .unwrap_or(0)
    }

    /// Iterate over all `(term, posting list)` pairs in term order.
    pub fn postings_iter(&self) -> impl Iterator<Item = (&Term, &PostingList)> {
        self.postings.iter()
    }

    /// Local doc ids whose encoded numeric value for `field` lies in
    /// `[lower, upper]`, sorted ascending. Tombstones are not filtered here.
    pub fn numeric_range(&self, field: &str, lower: u64, upper: u64) -> Vec<u32> {
        let Some(entries) = self.numeric.get(field) else {
            return Vec::new();
        };
        if lower > upper {
            return Vec::new();
        }
        let start = entries.partition_point(|&(encoded, _)| encoded < lower);
        let end = entries.partition_point(|&(encoded, _)| encoded <= upper);
        let mut docs: Vec<u32> = entries[start..end].iter().map(|&(_, doc)| doc).collect();
        docs.sort_unstable();
        docs
    }

    /// The numeric index entries, for merging.
    pub fn numeric_iter(&self) -> impl Iterator<Item = (&str, &[(u64, u32)])> {
        self.numeric
            .iter()
            .map(|(field, entries)| (field.as_str(), entries.as_slice()))
    }

    /// Stored fields of a local document id.
    pub fn stored(&self, doc_id: u32) -> Option<&StoredFields> {
        self.stored.get(doc_id as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageOutput;
    use crate::storage::memory::MemoryStorage;

    fn sample_segment() -> NewSegment {
        let mut segment = NewSegment::default();

        let mut java = PostingList::new();
        java.add_occurrence(0, 0);
        java.add_occurrence(1, 2);
        let mut lucene = PostingList::new();
        lucene.add_occurrence(1, 0);
        segment.postings = vec![
            (Term::new("bookName", "java"), java),
            (Term::new("bookName", "lucene"), lucene),
        ];

        let mut doc0 = StoredFields::new();
        doc0.push("bookName", FieldValue::Text("Java Programming".to_string()));
        doc0.push("bookPrice", FieldValue::Float(90.0));
        let mut doc1 = StoredFields::new();
        doc1.push("bookName", FieldValue::Text("Lucene in Java".to_string()));
        doc1.push("bookPrice", FieldValue::Float(50.0));
        segment.stored = vec![doc0, doc1];

        segment.numeric.insert(
            "bookPrice".to_string(),
            vec![
                (crate::index::numeric::encode_f64(50.0), 1),
                (crate::index::numeric::encode_f64(90.0), 0),
            ],
        );
        segment
    }

    fn entry(doc_count: u32) -> SegmentEntry {
        SegmentEntry {
            name: "seg_000001".to_string(),
            doc_count,
            del_gen: 0,
        }
    }

    #[test]
    fn test_write_open_roundtrip() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let segment = sample_segment();
        segment.write(&storage, "seg_000001").unwrap();

        let reader = SegmentReader::open(&storage, &entry(2)).unwrap();
        assert_eq!(reader.doc_count(), 2);
        assert_eq!(reader.live_count(), 2);

        let list = reader.postings(&Term::new("bookName", "java")).unwrap();
        assert_eq!(list.doc_frequency(), 2);
        assert!(reader.postings(&Term::new("bookName", "solr")).is_none());

        let stored = reader.stored(0).unwrap();
        assert_eq!(
            stored.get("bookName").unwrap().as_text(),
            Some("Java Programming")
        );
        assert_eq!(stored.get("bookPrice").unwrap().as_f64(), Some(90.0));
    }

    #[test]
    fn test_numeric_range_lookup() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        sample_segment().write(&storage, "seg_000001").unwrap();
        let reader = SegmentReader::open(&storage, &entry(2)).unwrap();

        let lower = crate::index::numeric::lower_bound(Some(80.0), true);
        let upper = crate::index::numeric::upper_bound(Some(100.0), true);
        assert_eq!(reader.numeric_range("bookPrice", lower, upper), vec![0]);

        let all = reader.numeric_range("bookPrice", 0, u64::MAX);
        assert_eq!(all, vec![0, 1]);

        assert!(reader.numeric_range("missing", 0, u64::MAX).is_empty());
    }

    #[test]
    fn test_doc_count_mismatch_is_corrupt() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        sample_segment().write(&storage, "seg_000001").unwrap();

        let result = SegmentReader::open(&storage, &entry(3));
        assert!(matches!(result, Err(XiphosError::Corrupt { .. })));
    }

    #[test]
    fn test_corrupt_postings_fail_open() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        sample_segment().write(&storage, "seg_000001").unwrap();

        // Damage a byte in the postings file.
        let mut input = storage.open_input("seg_000001/postings.bin").unwrap();
        let mut raw = Vec::new();
        std::io::Read::read_to_end(&mut input, &mut raw).unwrap();
        let mid = raw.len() / 2;
        raw[mid] ^= 0x01;
        let mut output = storage.create_output("seg_000001/postings.bin").unwrap();
        std::io::Write::write_all(&mut output, &raw).unwrap();
        output.close().unwrap();

        assert!(SegmentReader::open(&storage, &entry(2)).is_err());
    }
}
