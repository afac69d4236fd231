//! Posting lists and the writer's in-memory posting buffer.
//!
//! A [`Posting`] records that a term occurs in one document, with frequency
//! and position detail. A [`PostingList`] holds the postings for one term,
//! ordered by document id ascending. Document ids here are segment-local.

use ahash::AHashMap;

use crate::error::Result;
use crate::index::Term;
use crate::storage::structured::{StructReader, StructWriter};
use crate::storage::{StorageInput, StorageOutput};

/// A single posting in a posting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// Segment-local document id.
    pub doc_id: u32,
    /// Term frequency in the document.
    pub frequency: u32,
    /// Positions of the term in the document.
    pub positions: Vec<u32>,
}

impl Posting {
    /// Create a posting from the positions the term occurred at.
    pub fn with_positions(doc_id: u32, positions: Vec<u32>) -> Self {
        let frequency = positions.len() as u32;
        Posting {
            doc_id,
            frequency,
            positions,
        }
    }
}

/// A posting list for a specific term, ordered by document id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingList {
    /// The postings in this list.
    pub postings: Vec<Posting>,
    /// Total term frequency across all documents.
    pub total_frequency: u64,
}

impl PostingList {
    /// Create a new empty posting list.
    pub fn new() -> Self {
        PostingList::default()
    }

    /// Record one occurrence of the term in `doc_id` at `position`.
    ///
    /// Documents are buffered in ascending id order, so occurrences for one
    /// document always arrive adjacent; the list stays sorted by doc id.
    pub fn add_occurrence(&mut self, doc_id: u32, position: u32) {
        self.total_frequency += 1;
        match self.postings.last_mut() {
            Some(last) if last.doc_id == doc_id => {
                last.positions.push(position);
                last.frequency += 1;
            }
            _ => {
                self.postings.push(Posting::with_positions(doc_id, vec![position]));
            }
        }
    }

    /// Append a whole posting. Caller must keep doc ids ascending.
    pub fn push(&mut self, posting: Posting) {
        debug_assert!(
            self.postings
                .last()
                .is_none_or(|last| last.doc_id < posting.doc_id)
        );
        self.total_frequency += posting.frequency as u64;
        self.postings.push(posting);
    }

    /// Number of documents containing this term.
    pub fn doc_frequency(&self) -> u64 {
        self.postings.len() as u64
    }

    /// Check if the posting list is empty.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Get an iterator over the postings.
    pub fn iter(&'_ self) -> std::slice::Iter<'_, Posting> {
        self.postings.iter()
    }

    /// Encode this posting list into a structured writer.
    ///
    /// Doc ids and positions are delta-encoded varints.
    pub fn encode<W: StorageOutput>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        writer.write_varint(self.postings.len() as u64)?;
        let mut previous_doc = 0u32;
        for posting in &self.postings {
            writer.write_varint((posting.doc_id - previous_doc) as u64)?;
            previous_doc = posting.doc_id;

            writer.write_varint(posting.positions.len() as u64)?;
            let mut previous_pos = 0u32;
            for &position in &posting.positions {
                writer.write_varint((position - previous_pos) as u64)?;
                previous_pos = position;
            }
        }
        Ok(())
    }

    /// Decode a posting list from a structured reader.
    pub fn decode<R: StorageInput>(reader: &mut StructReader<R>) -> Result<Self> {
        let doc_count = reader.read_varint()? as usize;
        let mut list = PostingList::new();
        let mut doc_id = 0u32;
        for i in 0..doc_count {
            let delta = reader.read_varint()? as u32;
            doc_id = if i == 0 { delta } else { doc_id + delta };

            let position_count = reader.read_varint()? as usize;
            let mut positions = Vec::with_capacity(position_count);
            let mut position = 0u32;
            for j in 0..position_count {
                let pos_delta = reader.read_varint()? as u32;
                position = if j == 0 { pos_delta } else { position + pos_delta };
                positions.push(position);
            }
            list.push(Posting::with_positions(doc_id, positions));
        }
        Ok(list)
    }
}

/// The writer's in-memory inverted index for not-yet-flushed documents.
///
/// Keyed by buffer-local document ids; the flush remaps ids when tombstoned
/// buffer documents are dropped.
#[derive(Debug, Default)]
pub struct TermPostingMap {
    map: AHashMap<Term, PostingList>,
}

impl TermPostingMap {
    /// Create a new empty map.
    pub fn new() -> Self {
        TermPostingMap::default()
    }

    /// Record one occurrence of `term` in `doc_id` at `position`.
    pub fn add_occurrence(&mut self, term: Term, doc_id: u32, position: u32) {
        self.map
            .entry(term)
            .or_default()
            .add_occurrence(doc_id, position);
    }

    /// Look up the posting list for a term.
    pub fn get(&self, term: &Term) -> Option<&PostingList> {
        self.map.get(term)
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> usize {
        self.map.len()
    }

    /// Drain into `(term, posting list)` pairs sorted by term, remapping doc
    /// ids through `remap` (`None` drops the posting).
    pub fn into_sorted_remapped<F>(self, remap: F) -> Vec<(Term, PostingList)>
    where
        F: Fn(u32) -> Option<u32>,
    {
        let mut entries: Vec<(Term, PostingList)> = self
            .map
            .into_iter()
            .filter_map(|(term, list)| {
                let mut remapped = PostingList::new();
                for posting in list.postings {
                    if let Some(new_id) = remap(posting.doc_id) {
                        remapped.push(Posting::with_positions(new_id, posting.positions));
                    }
                }
                if remapped.is_empty() {
                    None
                } else {
                    Some((term, remapped))
                }
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Clear all buffered postings.
    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_add_occurrence_merges_same_doc() {
        let mut list = PostingList::new();
        list.add_occurrence(0, 1);
        list.add_occurrence(0, 5);
        list.add_occurrence(2, 0);

        assert_eq!(list.doc_frequency(), 2);
        assert_eq!(list.total_frequency, 3);
        assert_eq!(list.postings[0].frequency, 2);
        assert_eq!(list.postings[0].positions, vec![1, 5]);
        assert_eq!(list.postings[1].doc_id, 2);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut list = PostingList::new();
        list.add_occurrence(0, 3);
        list.add_occurrence(0, 9);
        list.add_occurrence(5, 1);
        list.add_occurrence(17, 0);

        let storage = MemoryStorage::new();
        let output = storage.create_output("postings.bin").unwrap();
        let mut writer = StructWriter::new(output);
        list.encode(&mut writer).unwrap();
        writer.close().unwrap();

        let input = storage.open_input("postings.bin").unwrap();
        let mut reader = StructReader::new(input, "postings.bin").unwrap();
        let decoded = PostingList::decode(&mut reader).unwrap();
        reader.verify_checksum().unwrap();

        assert_eq!(decoded, list);
    }

    #[test]
    fn test_remap_drops_and_renumbers() {
        let mut map = TermPostingMap::new();
        map.add_occurrence(Term::new("bookName", "java"), 0, 0);
        map.add_occurrence(Term::new("bookName", "java"), 1, 0);
        map.add_occurrence(Term::new("bookName", "java"), 2, 0);
        map.add_occurrence(Term::new("bookName", "lucene"), 1, 1);

        // Drop buffer doc 1, renumber 2 -> 1.
        let remap = |doc: u32| match doc {
            0 => Some(0),
            2 => Some(1),
            _ => None,
        };
        let entries = map.into_sorted_remapped(remap);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, Term::new("bookName", "java"));
        let docs: Vec<u32> = entries[0].1.iter().map(|p| p.doc_id).collect();
        assert_eq!(docs, vec![0, 1]);
    }

    #[test]
    fn test_sorted_by_term() {
        let mut map = TermPostingMap::new();
        map.add_occurrence(Term::new("b", "z"), 0, 0);
        map.add_occurrence(Term::new("a", "z"), 0, 0);
        map.add_occurrence(Term::new("a", "a"), 0, 0);

        let entries = map.into_sorted_remapped(Some);
        let terms: Vec<String> = entries.iter().map(|(t, _)| t.to_string()).collect();
        assert_eq!(terms, vec!["a:a", "a:z", "b:z"]);
    }
}
