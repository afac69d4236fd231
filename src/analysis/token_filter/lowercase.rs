//! Lowercase filter implementation.
//!
//! Converts all token text to lowercase, which is what makes term matching
//! case-insensitive: index and query text pass through the same folding.
//!
//! # Examples
//!
//! ```
//! use xiphos::analysis::token::Token;
//! use xiphos::analysis::token_filter::Filter;
//! use xiphos::analysis::token_filter::lowercase::LowercaseFilter;
//!
//! let filter = LowercaseFilter::new();
//! let tokens = vec![Token::new("Hello", 0), Token::new("WORLD", 1)];
//! let filtered: Vec<_> = filter.filter(Box::new(tokens.into_iter()))
//!     .unwrap()
//!     .collect();
//!
//! assert_eq!(filtered[0].text, "hello");
//! assert_eq!(filtered[1].text, "world");
//! ```

use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::error::Result;

/// A filter that converts tokens to lowercase.
///
/// Positions and offsets are preserved.
#[derive(Clone, Debug, Default)]
pub struct LowercaseFilter;

impl LowercaseFilter {
    /// Create a new lowercase filter.
    pub fn new() -> Self {
        LowercaseFilter
    }
}

impl Filter for LowercaseFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        let filtered: Vec<_> = tokens
            .map(|token| {
                if token.text.chars().all(|c| c.is_lowercase() || !c.is_alphabetic()) {
                    token
                } else {
                    let lowered = token.text.to_lowercase();
                    token.with_text(lowered)
                }
            })
            .collect();

        Ok(Box::new(filtered.into_iter()))
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}
