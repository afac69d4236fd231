//! Whitespace tokenizer implementation.
//!
//! Splits text on whitespace runs only, leaving punctuation attached to the
//! surrounding word. This is the plain lexical segmentation used when the
//! Unicode word-boundary rules are not wanted.

use crate::analysis::token::{Token, TokenStream};
use crate::analysis::tokenizer::Tokenizer;
use crate::error::Result;

/// A tokenizer that splits text on whitespace.
///
/// # Examples
///
/// ```
/// use xiphos::analysis::tokenizer::Tokenizer;
/// use xiphos::analysis::tokenizer::whitespace::WhitespaceTokenizer;
///
/// let tokenizer = WhitespaceTokenizer::new();
/// let tokens: Vec<_> = tokenizer.tokenize("hello  world").unwrap().collect();
///
/// assert_eq!(tokens.len(), 2);
/// assert_eq!(tokens[1].text, "world");
/// ```
#[derive(Clone, Debug, Default)]
pub struct WhitespaceTokenizer;

impl WhitespaceTokenizer {
    /// Create a new whitespace tokenizer.
    pub fn new() -> Self {
        WhitespaceTokenizer
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenStream> {
        let mut position = 0u32;
        let mut tokens = Vec::new();

        for (start_offset, word) in text.split_whitespace().map(|w| {
            // split_whitespace does not expose offsets; recover them from
            // pointer arithmetic against the original text.
            let start = w.as_ptr() as usize - text.as_ptr() as usize;
            (start, w)
        }) {
            let end_offset = start_offset + word.len();
            tokens.push(Token::with_offsets(word, position, start_offset, end_offset));
            position += 1;
        }

        Ok(Box::new(tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "whitespace"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_tokenizer() {
        let tokenizer = WhitespaceTokenizer::new();
        let tokens: Vec<Token> = tokenizer.tokenize("hello world  again").unwrap().collect();

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].text, "hello");
        assert_eq!(tokens[1].text, "world");
        assert_eq!(tokens[2].text, "again");
        assert_eq!(tokens[2].start_offset, 13);
    }

    #[test]
    fn test_punctuation_kept() {
        let tokenizer = WhitespaceTokenizer::new();
        let tokens: Vec<Token> = tokenizer.tokenize("hello, world!").unwrap().collect();

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "hello,");
        assert_eq!(tokens[1].text, "world!");
    }

    #[test]
    fn test_empty_input() {
        let tokenizer = WhitespaceTokenizer::new();
        let tokens: Vec<Token> = tokenizer.tokenize("   ").unwrap().collect();
        assert!(tokens.is_empty());
    }
}
