//! Snapshot-isolated index searcher.
//!
//! A searcher's view is the segment set and deletion bitmaps of the
//! generation whose marker it read at open time. Later commits do not
//! affect it until [`IndexSearcher::refresh`] swaps in the latest durable
//! generation, a cheap operation that reuses every unchanged segment
//! reader. Searchers never take the write lock and any number may run
//! concurrently with one writer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::error::{Result, XiphosError};
use crate::index::manifest::{IndexManifest, SegmentEntry};
use crate::index::numeric;
use crate::index::segment::{SegmentReader, StoredFields};
use crate::index::Term;
use crate::query::{BooleanQuery, Occur, Query};
use crate::search::collector::TopDocsCollector;
use crate::search::scorer::TfIdfScorer;
use crate::storage::Storage;

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Searcher-level document id (segment base + local id), valid for the
    /// snapshot that produced it.
    pub doc_id: u64,
    /// Relevance score.
    pub score: f32,
    /// Stored-field projection: fields indexed with `stored=true`, verbatim.
    pub fields: StoredFields,
}

/// The outcome of a search.
#[derive(Debug, Clone)]
pub struct TopDocs {
    /// True number of matching live documents, not capped by `top_n`.
    pub total_hits: u64,
    /// The ranked hits, best first.
    pub hits: Vec<SearchHit>,
}

/// One segment inside a snapshot, with its searcher-level doc id base.
struct SegmentSlice {
    entry: SegmentEntry,
    reader: Arc<SegmentReader>,
    base: u64,
}

/// A fixed view of one committed generation.
struct Snapshot {
    generation: u64,
    segments: Vec<SegmentSlice>,
    /// Total documents, tombstones included.
    total_docs: u64,
}

impl Snapshot {
    fn empty() -> Self {
        Snapshot {
            generation: 0,
            segments: Vec::new(),
            total_docs: 0,
        }
    }

    /// The slice containing a searcher-level doc id.
    fn slice_for(&self, doc_id: u64) -> Option<&SegmentSlice> {
        let index = self.segments.partition_point(|s| s.base <= doc_id);
        let slice = self.segments[..index].last()?;
        (doc_id - slice.base < slice.entry.doc_count as u64).then_some(slice)
    }
}

/// Snapshot-global term statistics backing the scorers, collected once per
/// search so scores are independent of segment iteration order.
struct TermStatistics {
    doc_freqs: HashMap<Term, u64>,
    total_docs: u64,
}

impl TermStatistics {
    fn collect(query: &Query, snapshot: &Snapshot) -> Self {
        let mut stats = TermStatistics {
            doc_freqs: HashMap::new(),
            total_docs: snapshot.total_docs,
        };
        stats.visit(query, snapshot);
        stats
    }

    fn visit(&mut self, query: &Query, snapshot: &Snapshot) {
        match query {
            Query::Term(term_query) => {
                let term = Term::new(term_query.field.clone(), term_query.text.clone());
                if !self.doc_freqs.contains_key(&term) {
                    let df = snapshot
                        .segments
                        .iter()
                        .map(|slice| slice.reader.doc_frequency(&term))
                        .sum();
                    self.doc_freqs.insert(term, df);
                }
            }
            Query::NumericRange(_) => {}
            Query::Boolean(boolean) => {
                for clause in boolean.clauses() {
                    self.visit(&clause.query, snapshot);
                }
            }
        }
    }

    fn doc_freq(&self, term: &Term) -> u64 {
        self.doc_freqs.get(term).copied().unwrap_or(0)
    }
}

/// A searcher over one store.
pub struct IndexSearcher {
    storage: Arc<dyn Storage>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl std::fmt::Debug for IndexSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.read();
        f.debug_struct("IndexSearcher")
            .field("generation", &snapshot.generation)
            .field("segments", &snapshot.segments.len())
            .finish()
    }
}

impl IndexSearcher {
    /// Open a searcher on the store's latest committed generation.
    pub fn open(storage: Arc<dyn Storage>) -> Result<Self> {
        let snapshot = Self::load_snapshot(&storage, &HashMap::new())?;
        Ok(IndexSearcher {
            storage,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Swap to the latest committed generation.
    ///
    /// Unchanged segments (same name and deletion-bitmap generation) are
    /// reused, so a refresh after a small commit only reads the new files.
    /// Returns true if the view changed.
    pub fn refresh(&self) -> Result<bool> {
        let current = self.snapshot.read().clone();
        if IndexManifest::read_generation(&self.storage)? == Some(current.generation) {
            return Ok(false);
        }

        let mut reuse = HashMap::new();
        for slice in &current.segments {
            reuse.insert(
                (slice.entry.name.clone(), slice.entry.del_gen),
                slice.reader.clone(),
            );
        }
        let fresh = Self::load_snapshot(&self.storage, &reuse)?;
        let changed = fresh.generation != current.generation;
        *self.snapshot.write() = Arc::new(fresh);
        Ok(changed)
    }

    /// Load the latest generation, retrying once if a concurrent commit
    /// purged the files between the marker read and the manifest read.
    fn load_snapshot(
        storage: &Arc<dyn Storage>,
        reuse: &HashMap<(String, u64), Arc<SegmentReader>>,
    ) -> Result<Snapshot> {
        let mut retried = false;
        loop {
            match Self::try_load(storage, reuse) {
                Ok(snapshot) => return Ok(snapshot),
                Err(XiphosError::Storage(_)) if !retried => {
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn try_load(
        storage: &Arc<dyn Storage>,
        reuse: &HashMap<(String, u64), Arc<SegmentReader>>,
    ) -> Result<Snapshot> {
        let Some(generation) = IndexManifest::read_generation(storage)? else {
            return Ok(Snapshot::empty());
        };
        let manifest = IndexManifest::load(storage, generation)?;

        let mut segments = Vec::with_capacity(manifest.segments.len());
        let mut base = 0u64;
        for entry in &manifest.segments {
            let key = (entry.name.clone(), entry.del_gen);
            let reader = match reuse.get(&key) {
                Some(reader) => reader.clone(),
                None => Arc::new(SegmentReader::open(storage, entry)?),
            };
            segments.push(SegmentSlice {
                entry: entry.clone(),
                reader,
                base,
            });
            base += entry.doc_count as u64;
        }

        Ok(Snapshot {
            generation,
            segments,
            total_docs: base,
        })
    }

    /// The committed generation this searcher is pinned to.
    pub fn generation(&self) -> u64 {
        self.snapshot.read().generation
    }

    /// Total documents in the snapshot, tombstones included.
    pub fn max_doc(&self) -> u64 {
        self.snapshot.read().total_docs
    }

    /// Live documents in the snapshot.
    pub fn num_docs(&self) -> u64 {
        let snapshot = self.snapshot.read();
        snapshot
            .segments
            .iter()
            .map(|slice| slice.reader.live_count() as u64)
            .sum()
    }

    /// Stored fields of a searcher-level doc id from the current snapshot.
    pub fn stored_fields(&self, doc_id: u64) -> Option<StoredFields> {
        let snapshot = self.snapshot.read();
        let slice = snapshot.slice_for(doc_id)?;
        slice.reader.stored((doc_id - slice.base) as u32).cloned()
    }

    /// Execute a query, returning the true hit count and the top `top_n`
    /// hits ranked by `(score descending, doc_id ascending)`.
    pub fn search(&self, query: &Query, top_n: usize) -> Result<TopDocs> {
        self.search_inner(query, top_n, None)
    }

    /// Like [`IndexSearcher::search`] but failing with
    /// [`XiphosError::Timeout`] once `timeout` elapses, to bound pathological
    /// query cost.
    pub fn search_with_deadline(
        &self,
        query: &Query,
        top_n: usize,
        timeout: Duration,
    ) -> Result<TopDocs> {
        self.search_inner(query, top_n, Some(Instant::now() + timeout))
    }

    fn search_inner(
        &self,
        query: &Query,
        top_n: usize,
        deadline: Option<Instant>,
    ) -> Result<TopDocs> {
        let snapshot = self.snapshot.read().clone();
        let stats = TermStatistics::collect(query, &snapshot);

        let mut collector = TopDocsCollector::new(top_n);
        for slice in &snapshot.segments {
            check_deadline(deadline)?;
            let matches = eval_segment(query, &slice.reader, &stats, deadline)?;
            for (local_doc, score) in matches {
                if slice.reader.is_live(local_doc) {
                    collector.collect(slice.base + local_doc as u64, score);
                }
            }
        }

        let total_hits = collector.total_hits();
        let mut hits = Vec::new();
        for scored in collector.into_ranked() {
            let slice = snapshot.slice_for(scored.doc_id).ok_or_else(|| {
                XiphosError::search(format!("hit {} outside snapshot", scored.doc_id))
            })?;
            let fields = slice
                .reader
                .stored((scored.doc_id - slice.base) as u32)
                .cloned()
                .unwrap_or_default();
            hits.push(SearchHit {
                doc_id: scored.doc_id,
                score: scored.score,
                fields,
            });
        }

        Ok(TopDocs { total_hits, hits })
    }
}

fn check_deadline(deadline: Option<Instant>) -> Result<()> {
    if let Some(deadline) = deadline
        && Instant::now() >= deadline
    {
        return Err(XiphosError::timeout("search deadline elapsed"));
    }
    Ok(())
}

/// Resolve a query against one segment into `(local doc, score)` pairs
/// sorted by doc id. Tombstones are filtered by the caller.
fn eval_segment(
    query: &Query,
    reader: &SegmentReader,
    stats: &TermStatistics,
    deadline: Option<Instant>,
) -> Result<Vec<(u32, f32)>> {
    match query {
        Query::Term(term_query) => {
            let term = Term::new(term_query.field.clone(), term_query.text.clone());
            let Some(list) = reader.postings(&term) else {
                return Ok(Vec::new());
            };
            let scorer = TfIdfScorer::new(stats.doc_freq(&term), stats.total_docs, term_query.boost);
            Ok(list
                .iter()
                .map(|posting| (posting.doc_id, scorer.score(posting.frequency)))
                .collect())
        }
        Query::NumericRange(range) => {
            let lower = numeric::lower_bound(range.min, range.min_inclusive);
            let upper = numeric::upper_bound(range.max, range.max_inclusive);
            Ok(reader
                .numeric_range(&range.field, lower, upper)
                .into_iter()
                .map(|doc_id| (doc_id, range.boost))
                .collect())
        }
        Query::Boolean(boolean) => eval_boolean(boolean, reader, stats, deadline),
    }
}

/// Evaluate a boolean query over one segment.
///
/// A document matches iff it matches every MUST clause, no MUST_NOT clause,
/// and at least one SHOULD clause when any exist. Matching MUST and SHOULD
/// scores add up; MUST_NOT only filters. A query with only MUST_NOT clauses
/// matches the complement at constant score.
fn eval_boolean(
    boolean: &BooleanQuery,
    reader: &SegmentReader,
    stats: &TermStatistics,
    deadline: Option<Instant>,
) -> Result<Vec<(u32, f32)>> {
    if boolean.is_empty() {
        return Ok(Vec::new());
    }
    check_deadline(deadline)?;

    let mut must: Option<Vec<(u32, f32)>> = None;
    for clause in boolean.clauses_by_occur(Occur::Must) {
        let matches = eval_segment(&clause.query, reader, stats, deadline)?;
        must = Some(match must {
            None => matches,
            Some(acc) => intersect(acc, matches),
        });
        if must.as_ref().is_some_and(|m| m.is_empty()) {
            return Ok(Vec::new());
        }
    }

    let mut should: Option<Vec<(u32, f32)>> = None;
    for clause in boolean.clauses_by_occur(Occur::Should) {
        check_deadline(deadline)?;
        let matches = eval_segment(&clause.query, reader, stats, deadline)?;
        should = Some(match should {
            None => matches,
            Some(acc) => union(acc, matches),
        });
    }

    let base = match (must, should) {
        (Some(must), Some(should)) => intersect(must, should),
        (Some(must), None) => must,
        (None, Some(should)) => should,
        // Only MUST_NOT clauses: start from every document in the segment.
        (None, None) => (0..reader.doc_count()).map(|doc| (doc, 1.0)).collect(),
    };

    let mut result = base;
    for clause in boolean.clauses_by_occur(Occur::MustNot) {
        check_deadline(deadline)?;
        if result.is_empty() {
            break;
        }
        let excluded = eval_segment(&clause.query, reader, stats, deadline)?;
        result = subtract(result, &excluded);
    }
    Ok(result)
}

/// Docs present in both lists; scores add.
fn intersect(a: Vec<(u32, f32)>, b: Vec<(u32, f32)>) -> Vec<(u32, f32)> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push((a[i].0, a[i].1 + b[j].1));
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Docs present in either list; scores add where both match.
fn union(a: Vec<(u32, f32)>, b: Vec<(u32, f32)>) -> Vec<(u32, f32)> {
    let mut out = Vec::with_capacity(a.len().max(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push((a[i].0, a[i].1 + b[j].1));
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Docs in `a` not present in `b`.
fn subtract(a: Vec<(u32, f32)>, b: &[(u32, f32)]) -> Vec<(u32, f32)> {
    let mut out = Vec::with_capacity(a.len());
    let mut j = 0;
    for item in a {
        while j < b.len() && b[j].0 < item.0 {
            j += 1;
        }
        if j >= b.len() || b[j].0 != item.0 {
            out.push(item);
        }
    }
    out
}
