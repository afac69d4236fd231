//! Top-N collection of scored documents.
//!
//! The collector keeps the best `top_n` candidates in a min-heap while
//! counting every match, so `total_hits` is the true match count, not capped
//! by `top_n`. Ordering is `(score descending, doc_id ascending)`; the
//! doc-id tie-break makes result order deterministic when scores are equal.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A scored document candidate.
#[derive(Debug, Clone, Copy)]
pub struct ScoredDoc {
    /// Searcher-level document id (segment base + local id).
    pub doc_id: u64,
    /// Relevance score.
    pub score: f32,
}

impl PartialEq for ScoredDoc {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredDoc {}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredDoc {
    /// Greater means "ranks better": higher score, then lower doc id.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.doc_id.cmp(&self.doc_id))
    }
}

/// Collects matches, retaining the top `top_n` by rank.
#[derive(Debug)]
pub struct TopDocsCollector {
    top_n: usize,
    total_hits: u64,
    heap: BinaryHeap<Reverse<ScoredDoc>>,
}

impl TopDocsCollector {
    /// Create a collector retaining at most `top_n` candidates.
    pub fn new(top_n: usize) -> Self {
        TopDocsCollector {
            top_n,
            total_hits: 0,
            heap: BinaryHeap::with_capacity(top_n + 1),
        }
    }

    /// Record a matching document.
    pub fn collect(&mut self, doc_id: u64, score: f32) {
        self.total_hits += 1;
        if self.top_n == 0 {
            return;
        }
        self.heap.push(Reverse(ScoredDoc { doc_id, score }));
        if self.heap.len() > self.top_n {
            self.heap.pop();
        }
    }

    /// The true number of matches recorded.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Finish collection: the retained candidates, best first.
    pub fn into_ranked(self) -> Vec<ScoredDoc> {
        let mut ranked: Vec<ScoredDoc> = self.heap.into_iter().map(|entry| entry.0).collect();
        ranked.sort_by(|a, b| b.cmp(a));
        ranked
    }
}
