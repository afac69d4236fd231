//! Query execution: snapshot-isolated searching, scoring, and collection.

pub mod collector;
pub mod scorer;
pub mod searcher;

pub use collector::{ScoredDoc, TopDocsCollector};
pub use scorer::TfIdfScorer;
pub use searcher::{IndexSearcher, SearchHit, TopDocs};
