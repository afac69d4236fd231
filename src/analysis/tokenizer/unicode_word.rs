//! Unicode word tokenizer implementation.
//!
//! Splits text using Unicode word boundary rules (UAX #29) and keeps only
//! segments containing at least one alphanumeric character, so punctuation
//! and whitespace never reach the index.
//!
//! # Examples
//!
//! ```
//! use xiphos::analysis::tokenizer::Tokenizer;
//! use xiphos::analysis::tokenizer::unicode_word::UnicodeWordTokenizer;
//!
//! let tokenizer = UnicodeWordTokenizer::new();
//! let tokens: Vec<_> = tokenizer.tokenize("Hello, world!").unwrap().collect();
//!
//! assert_eq!(tokens[0].text, "Hello");
//! assert_eq!(tokens[1].text, "world");
//! ```

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::{Token, TokenStream};
use crate::analysis::tokenizer::Tokenizer;
use crate::error::Result;

/// A tokenizer that splits text on Unicode word boundaries.
///
/// Uses the Unicode Text Segmentation algorithm (UAX #29), which handles
/// international text (CJK, Arabic, etc.) correctly. Byte offsets come from
/// the segmentation itself, so repeated words keep their true offsets.
#[derive(Clone, Debug, Default)]
pub struct UnicodeWordTokenizer;

impl UnicodeWordTokenizer {
    /// Create a new Unicode word tokenizer.
    pub fn new() -> Self {
        UnicodeWordTokenizer
    }
}

impl Tokenizer for UnicodeWordTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenStream> {
        let mut position = 0u32;
        let mut tokens = Vec::new();

        for (start_offset, word) in text.split_word_bound_indices() {
            // Only keep actual words (not whitespace or punctuation)
            if word.chars().any(|c| c.is_alphanumeric()) {
                let end_offset = start_offset + word.len();
                tokens.push(Token::with_offsets(word, position, start_offset, end_offset));
                position += 1;
            }
        }

        Ok(Box::new(tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "unicode_word"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicode_word_tokenizer() {
        let tokenizer = UnicodeWordTokenizer::new();
        let tokens: Vec<Token> = tokenizer.tokenize("hello, world!").unwrap().collect();

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "hello");
        assert_eq!(tokens[1].text, "world");
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[1].position, 1);
    }

    #[test]
    fn test_repeated_word_offsets() {
        let tokenizer = UnicodeWordTokenizer::new();
        let tokens: Vec<Token> = tokenizer.tokenize("java and java").unwrap().collect();

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].start_offset, 0);
        assert_eq!(tokens[2].start_offset, 9);
        assert_eq!(tokens[2].end_offset, 13);
    }

    #[test]
    fn test_non_ascii_text() {
        let tokenizer = UnicodeWordTokenizer::new();
        let tokens: Vec<Token> = tokenizer.tokenize("café résumé").unwrap().collect();

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "café");
        assert_eq!(tokens[1].text, "résumé");
    }

    #[test]
    fn test_determinism() {
        let tokenizer = UnicodeWordTokenizer::new();
        let first: Vec<Token> = tokenizer.tokenize("Edition in Action").unwrap().collect();
        let second: Vec<Token> = tokenizer.tokenize("Edition in Action").unwrap().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tokenizer_name() {
        assert_eq!(UnicodeWordTokenizer::new().name(), "unicode_word");
    }
}
