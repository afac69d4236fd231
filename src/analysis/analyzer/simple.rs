//! Simple analyzer: plain lexical segmentation.
//!
//! Splits on whitespace and lowercases, nothing else. Useful for fields
//! holding identifiers or pre-normalized text where Unicode word-boundary
//! splitting and stop word removal would be wrong.

use std::sync::Arc;

use crate::analysis::analyzer::Analyzer;
use crate::analysis::analyzer::pipeline::PipelineAnalyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::lowercase::LowercaseFilter;
use crate::analysis::tokenizer::whitespace::WhitespaceTokenizer;
use crate::error::Result;

/// An analyzer that only splits on whitespace and lowercases.
///
/// # Examples
///
/// ```
/// use xiphos::analysis::analyzer::Analyzer;
/// use xiphos::analysis::analyzer::simple::SimpleAnalyzer;
///
/// let analyzer = SimpleAnalyzer::new();
/// let tokens: Vec<_> = analyzer.analyze("The Quick FOX").unwrap().collect();
///
/// assert_eq!(tokens.len(), 3);
/// assert_eq!(tokens[0].text, "the");
/// ```
pub struct SimpleAnalyzer {
    inner: PipelineAnalyzer,
}

impl SimpleAnalyzer {
    /// Create a new simple analyzer.
    pub fn new() -> Self {
        let analyzer = PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()))
            .add_filter(Arc::new(LowercaseFilter::new()));

        SimpleAnalyzer { inner: analyzer }
    }
}

impl Default for SimpleAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for SimpleAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        self.inner.analyze(text)
    }

    fn name(&self) -> &'static str {
        "simple"
    }
}

impl std::fmt::Debug for SimpleAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleAnalyzer").finish()
    }
}
