//! TF-IDF scoring for ranking search results.
//!
//! The baseline relevance score of a matched term clause is term frequency
//! times inverse document frequency. Document frequencies are snapshot-global
//! (summed across segments, tombstones included), so a score depends only on
//! the snapshot contents, never on segment iteration order.

/// A per-term TF-IDF scorer.
///
/// # Formula
///
/// ```text
/// idf = 1 + ln((N + 1) / (df + 1))
/// tf  = sqrt(term_frequency)
/// score = boost · tf · idf
/// ```
///
/// The smoothed idf stays positive even when a term occurs in every
/// document, so a matched clause always contributes weight.
#[derive(Debug, Clone)]
pub struct TfIdfScorer {
    /// Documents containing the term, across the whole snapshot.
    doc_freq: u64,
    /// Total documents in the snapshot.
    total_docs: u64,
    /// Boost factor.
    boost: f32,
}

impl TfIdfScorer {
    /// Create a scorer from snapshot-global statistics.
    pub fn new(doc_freq: u64, total_docs: u64, boost: f32) -> Self {
        TfIdfScorer {
            doc_freq,
            total_docs,
            boost,
        }
    }

    /// The inverse-document-frequency component.
    pub fn idf(&self) -> f32 {
        let n = self.total_docs as f32;
        let df = self.doc_freq as f32;
        1.0 + ((n + 1.0) / (df + 1.0)).ln()
    }

    /// Score one document given the term's frequency in it.
    pub fn score(&self, term_freq: u32) -> f32 {
        if term_freq == 0 {
            return 0.0;
        }
        self.boost * (term_freq as f32).sqrt() * self.idf()
    }

    /// Get the boost factor.
    pub fn boost(&self) -> f32 {
        self.boost
    }
}
