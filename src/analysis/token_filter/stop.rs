//! Stop filter implementation.
//!
//! Removes common words (stop words) that typically don't contribute to
//! search relevance. Ships a default English list; custom lists are
//! supported through [`StopFilter::from_words`].
//!
//! # Examples
//!
//! ```
//! use xiphos::analysis::token::Token;
//! use xiphos::analysis::token_filter::Filter;
//! use xiphos::analysis::token_filter::stop::StopFilter;
//!
//! let filter = StopFilter::new(); // Uses default English stop words
//! let tokens = vec![
//!     Token::new("the", 0),
//!     Token::new("quick", 1),
//!     Token::new("brown", 2),
//! ];
//!
//! let result: Vec<_> = filter.filter(Box::new(tokens.into_iter()))
//!     .unwrap()
//!     .collect();
//!
//! // "the" is removed as a stop word
//! assert_eq!(result.len(), 2);
//! assert_eq!(result[0].text, "quick");
//! assert_eq!(result[1].text, "brown");
//! ```

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::error::Result;

/// Default English stop words list.
///
/// Common English words that are typically filtered out during indexing.
const DEFAULT_ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

static DEFAULT_STOP_SET: LazyLock<Arc<HashSet<String>>> = LazyLock::new(|| {
    Arc::new(
        DEFAULT_ENGLISH_STOP_WORDS
            .iter()
            .map(|s| s.to_string())
            .collect(),
    )
});

/// A filter that removes stop words from the token stream.
///
/// Matching is exact, so this filter is normally placed after
/// [`LowercaseFilter`](crate::analysis::token_filter::LowercaseFilter) in
/// the pipeline.
#[derive(Clone, Debug)]
pub struct StopFilter {
    stop_words: Arc<HashSet<String>>,
}

impl StopFilter {
    /// Create a new stop filter with the default English stop word list.
    pub fn new() -> Self {
        StopFilter {
            stop_words: DEFAULT_STOP_SET.clone(),
        }
    }

    /// Create a new stop filter from a custom word list.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StopFilter {
            stop_words: Arc::new(words.into_iter().map(Into::into).collect()),
        }
    }

    /// Check if a word is a stop word.
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }
}

impl Default for StopFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for StopFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        let stop_words = self.stop_words.clone();
        let filtered: Vec<_> = tokens
            .filter(|token| !stop_words.contains(&token.text))
            .collect();

        Ok(Box::new(filtered.into_iter()))
    }

    fn name(&self) -> &'static str {
        "stop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::Token;

    #[test]
    fn test_stop_filter_defaults() {
        let filter = StopFilter::new();
        let tokens = vec![
            Token::new("the", 0),
            Token::new("java", 1),
            Token::new("and", 2),
            Token::new("lucene", 3),
        ];

        let result: Vec<Token> = filter
            .filter(Box::new(tokens.into_iter()))
            .unwrap()
            .collect();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text, "java");
        assert_eq!(result[1].text, "lucene");
    }

    #[test]
    fn test_stop_filter_custom_words() {
        let filter = StopFilter::from_words(vec!["java"]);
        let tokens = vec![Token::new("java", 0), Token::new("the", 1)];

        let result: Vec<Token> = filter
            .filter(Box::new(tokens.into_iter()))
            .unwrap()
            .collect();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "the");
    }

    #[test]
    fn test_is_stop_word() {
        let filter = StopFilter::new();
        assert!(filter.is_stop_word("the"));
        assert!(!filter.is_stop_word("search"));
    }
}
