//! Textual query expression parser.
//!
//! Grammar (keywords case-insensitive, parentheses optional):
//!
//! ```text
//! expr   := clause (("AND" | "OR" | "NOT") clause)*
//! clause := [field ":"] term | "(" expr ")"
//! ```
//!
//! A bare clause is a required (MUST) term against the default field; `OR`
//! demotes the joined clauses to SHOULD; `NOT` makes the following clause
//! MUST_NOT. Term text is normalized through the same analyzer used at index
//! time, so `Title:JAVA` and `title:java` produce the same term query.
//!
//! Malformed input always fails with a
//! [`Parse`](crate::error::XiphosError::Parse) error carrying the byte
//! offset of the offending token; it never silently degrades to a
//! different query.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use xiphos::analysis::analyzer::standard::StandardAnalyzer;
//! use xiphos::query::QueryParser;
//!
//! let parser = QueryParser::new("bookName", Arc::new(StandardAnalyzer::new()));
//! let query = parser.parse("bookName:java NOT bookName:lucene").unwrap();
//! assert_eq!(query.description(), "+bookName:java -bookName:lucene");
//! ```

use std::sync::Arc;

use crate::analysis::analyzer::Analyzer;
use crate::error::{Result, XiphosError};
use crate::query::{BooleanClause, BooleanQuery, Occur, Query, TermQuery};

/// A query parser bound to a default field and an analyzer.
pub struct QueryParser {
    default_field: String,
    analyzer: Arc<dyn Analyzer>,
}

impl std::fmt::Debug for QueryParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryParser")
            .field("default_field", &self.default_field)
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

/// Lexed pieces of the expression, each with its byte offset.
#[derive(Debug, Clone, PartialEq)]
enum LexToken<'a> {
    Word { text: &'a str, offset: usize },
    LParen { offset: usize },
    RParen { offset: usize },
}

impl<'a> LexToken<'a> {
    fn offset(&self) -> usize {
        match self {
            LexToken::Word { offset, .. }
            | LexToken::LParen { offset }
            | LexToken::RParen { offset } => *offset,
        }
    }
}

/// The join operator in force before the next clause.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Join {
    And,
    Or,
}

impl QueryParser {
    /// Create a new parser over the given default field and analyzer.
    pub fn new<S: Into<String>>(default_field: S, analyzer: Arc<dyn Analyzer>) -> Self {
        QueryParser {
            default_field: default_field.into(),
            analyzer,
        }
    }

    /// Get the default field.
    pub fn default_field(&self) -> &str {
        &self.default_field
    }

    /// Parse an expression into a [`Query`].
    pub fn parse(&self, expression: &str) -> Result<Query> {
        let tokens = lex(expression);
        let mut position = 0usize;
        let query = self.parse_group(expression, &tokens, &mut position, None)?;

        if position < tokens.len() {
            // parse_group only stops early on an unmatched ')'.
            return Err(XiphosError::parse(
                "unmatched ')'",
                tokens[position].offset(),
            ));
        }

        match query {
            Some(query) => Ok(query),
            None => Err(XiphosError::parse("empty query expression", 0)),
        }
    }

    /// Parse a clause sequence until end of input or the ')' closing the
    /// group opened at `open_offset`.
    fn parse_group(
        &self,
        expression: &str,
        tokens: &[LexToken<'_>],
        position: &mut usize,
        open_offset: Option<usize>,
    ) -> Result<Option<Query>> {
        let mut clauses: Vec<BooleanClause> = Vec::new();
        let mut join: Option<Join> = None;
        let mut negate = false;
        let mut need_clause = false;
        let mut closed = false;

        while *position < tokens.len() {
            let token = &tokens[*position];
            match token {
                LexToken::Word { text, offset } if text.eq_ignore_ascii_case("and") => {
                    if clauses.is_empty() || need_clause {
                        return Err(XiphosError::parse("'AND' needs a clause before it", *offset));
                    }
                    join = Some(Join::And);
                    need_clause = true;
                    *position += 1;
                }
                LexToken::Word { text, offset } if text.eq_ignore_ascii_case("or") => {
                    if clauses.is_empty() || need_clause {
                        return Err(XiphosError::parse("'OR' needs a clause before it", *offset));
                    }
                    join = Some(Join::Or);
                    need_clause = true;
                    *position += 1;
                }
                LexToken::Word { text, offset } if text.eq_ignore_ascii_case("not") => {
                    if negate {
                        return Err(XiphosError::parse("'NOT' cannot follow 'NOT'", *offset));
                    }
                    negate = true;
                    need_clause = true;
                    *position += 1;
                }
                LexToken::Word { text, offset } => {
                    let clause = self.parse_term_clause(text, *offset)?;
                    *position += 1;
                    Self::push_clause(&mut clauses, clause, join, negate);
                    join = None;
                    negate = false;
                    need_clause = false;
                }
                LexToken::LParen { offset } => {
                    *position += 1;
                    let inner =
                        self.parse_group(expression, tokens, position, Some(*offset))?;
                    Self::push_clause(&mut clauses, inner, join, negate);
                    join = None;
                    negate = false;
                    need_clause = false;
                }
                LexToken::RParen { offset } => {
                    if open_offset.is_none() {
                        // Let the caller report the unmatched ')'.
                        break;
                    }
                    if need_clause {
                        return Err(XiphosError::parse(
                            "expected a clause before ')'",
                            *offset,
                        ));
                    }
                    *position += 1;
                    closed = true;
                    break;
                }
            }
        }

        if let Some(offset) = open_offset
            && !closed
        {
            return Err(XiphosError::parse("unclosed '('", offset));
        }
        if need_clause && open_offset.is_none() && *position >= tokens.len() {
            return Err(XiphosError::parse(
                "expected a clause after operator",
                expression.len(),
            ));
        }

        Ok(Self::finish_group(clauses))
    }

    /// Append a parsed clause with the occur implied by the pending
    /// operators. `OR` demotes the previous clause to SHOULD as well.
    fn push_clause(
        clauses: &mut Vec<BooleanClause>,
        clause: Option<Query>,
        join: Option<Join>,
        negate: bool,
    ) {
        let Some(query) = clause else {
            // Dropped clause (stopwords only, or an empty group).
            return;
        };
        let occur = if negate {
            Occur::MustNot
        } else if join == Some(Join::Or) {
            if let Some(previous) = clauses.last_mut()
                && previous.occur == Occur::Must
            {
                previous.occur = Occur::Should;
            }
            Occur::Should
        } else {
            Occur::Must
        };
        clauses.push(BooleanClause::new(query, occur));
    }

    /// Reduce a finished clause list: nothing, a single required query
    /// unwrapped, or a boolean query.
    fn finish_group(clauses: Vec<BooleanClause>) -> Option<Query> {
        match clauses.len() {
            0 => None,
            1 if clauses[0].occur == Occur::Must => Some(clauses[0].query.clone()),
            _ => {
                let mut boolean = BooleanQuery::new();
                for clause in clauses {
                    boolean.add_clause(clause);
                }
                Some(boolean.into())
            }
        }
    }

    /// Turn a `field:term` or bare-term word into a query, normalizing the
    /// term text through the analyzer. Returns `None` when analysis drops
    /// every token (a stopword-only clause).
    fn parse_term_clause(&self, word: &str, offset: usize) -> Result<Option<Query>> {
        let (field, term_text) = match word.find(':') {
            Some(colon) => {
                let field = &word[..colon];
                let term = &word[colon + 1..];
                if field.is_empty() {
                    return Err(XiphosError::parse(
                        "missing field name before ':'",
                        offset + colon,
                    ));
                }
                if term.is_empty() {
                    return Err(XiphosError::parse(
                        "missing term after ':'",
                        offset + colon,
                    ));
                }
                (field, term)
            }
            None => (self.default_field.as_str(), word),
        };

        let tokens: Vec<_> = self.analyzer.analyze(term_text)?.collect();
        match tokens.len() {
            0 => Ok(None),
            1 => Ok(Some(TermQuery::new(field, tokens[0].text.clone()).into())),
            _ => {
                // A term that analyzes into several tokens becomes a nested
                // disjunction over them.
                let mut boolean = BooleanQuery::new();
                for token in tokens {
                    boolean.add_should(TermQuery::new(field, token.text));
                }
                Ok(Some(boolean.into()))
            }
        }
    }
}

/// Split an expression into words and parentheses, tracking byte offsets.
fn lex(expression: &str) -> Vec<LexToken<'_>> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;

    for (offset, ch) in expression.char_indices() {
        match ch {
            c if c.is_whitespace() => {
                if let Some(start) = word_start.take() {
                    tokens.push(LexToken::Word {
                        text: &expression[start..offset],
                        offset: start,
                    });
                }
            }
            '(' | ')' => {
                if let Some(start) = word_start.take() {
                    tokens.push(LexToken::Word {
                        text: &expression[start..offset],
                        offset: start,
                    });
                }
                tokens.push(if ch == '(' {
                    LexToken::LParen { offset }
                } else {
                    LexToken::RParen { offset }
                });
            }
            _ => {
                if word_start.is_none() {
                    word_start = Some(offset);
                }
            }
        }
    }
    if let Some(start) = word_start {
        tokens.push(LexToken::Word {
            text: &expression[start..],
            offset: start,
        });
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::standard::StandardAnalyzer;

    fn parser() -> QueryParser {
        QueryParser::new("bookName", Arc::new(StandardAnalyzer::new()))
    }

    fn parse_offset(result: Result<Query>) -> usize {
        match result {
            Err(XiphosError::Parse { offset, .. }) => offset,
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_bare_term_uses_default_field() {
        let query = parser().parse("java").unwrap();
        assert_eq!(query, TermQuery::new("bookName", "java").into());
    }

    #[test]
    fn test_parse_field_term() {
        let query = parser().parse("bookDesc:lucene").unwrap();
        assert_eq!(query, TermQuery::new("bookDesc", "lucene").into());
    }

    #[test]
    fn test_terms_are_normalized() {
        let query = parser().parse("bookName:JAVA").unwrap();
        assert_eq!(query, TermQuery::new("bookName", "java").into());
    }

    #[test]
    fn test_parse_not_clause() {
        let query = parser().parse("bookName:java NOT bookName:lucene").unwrap();
        let Query::Boolean(boolean) = query else {
            panic!("expected boolean query");
        };
        assert_eq!(boolean.clauses().len(), 2);
        assert_eq!(boolean.clauses()[0].occur, Occur::Must);
        assert_eq!(
            boolean.clauses()[0].query,
            TermQuery::new("bookName", "java").into()
        );
        assert_eq!(boolean.clauses()[1].occur, Occur::MustNot);
        assert_eq!(
            boolean.clauses()[1].query,
            TermQuery::new("bookName", "lucene").into()
        );
    }

    #[test]
    fn test_parse_and() {
        let query = parser().parse("bookName:java AND bookName:lucene").unwrap();
        assert_eq!(query.description(), "+bookName:java +bookName:lucene");
    }

    #[test]
    fn test_parse_or_demotes_to_should() {
        let query = parser().parse("java OR lucene OR solr").unwrap();
        let Query::Boolean(boolean) = query else {
            panic!("expected boolean query");
        };
        assert!(boolean.clauses().iter().all(|c| c.occur == Occur::Should));
        assert_eq!(boolean.clauses().len(), 3);
    }

    #[test]
    fn test_implicit_and_between_bare_clauses() {
        let query = parser().parse("bookName:java bookDesc:guide").unwrap();
        assert_eq!(query.description(), "+bookName:java +bookDesc:guide");
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let query = parser().parse("java and lucene").unwrap();
        assert_eq!(query.description(), "+bookName:java +bookName:lucene");

        let query = parser().parse("java not lucene").unwrap();
        assert_eq!(query.description(), "+bookName:java -bookName:lucene");
    }

    #[test]
    fn test_parenthesised_group() {
        let query = parser()
            .parse("bookName:java AND (bookDesc:guide OR bookDesc:reference)")
            .unwrap();
        assert_eq!(
            query.description(),
            "+bookName:java +(bookDesc:guide bookDesc:reference)"
        );
    }

    #[test]
    fn test_trailing_colon_fails_at_colon_offset() {
        assert_eq!(parse_offset(parser().parse("bookName:")), 8);
    }

    #[test]
    fn test_leading_colon_fails() {
        assert_eq!(parse_offset(parser().parse(":java")), 0);
    }

    #[test]
    fn test_dangling_operator_fails_at_end() {
        let expression = "bookName:java AND";
        assert_eq!(
            parse_offset(parser().parse(expression)),
            expression.len()
        );
    }

    #[test]
    fn test_leading_operator_fails() {
        assert_eq!(parse_offset(parser().parse("AND java")), 0);
    }

    #[test]
    fn test_unclosed_paren_fails_at_open() {
        assert_eq!(parse_offset(parser().parse("(java OR lucene")), 0);
    }

    #[test]
    fn test_unmatched_close_paren_fails() {
        assert_eq!(parse_offset(parser().parse("java) lucene")), 4);
    }

    #[test]
    fn test_empty_expression_fails() {
        assert_eq!(parse_offset(parser().parse("")), 0);
        assert_eq!(parse_offset(parser().parse("   ")), 0);
    }

    #[test]
    fn test_stopword_only_clause_drops_out() {
        let query = parser().parse("the java").unwrap();
        assert_eq!(query, TermQuery::new("bookName", "java").into());
    }

    #[test]
    fn test_all_stopwords_is_empty_error() {
        assert_eq!(parse_offset(parser().parse("the of to the")), 0);
    }

    #[test]
    fn test_multi_token_term_becomes_disjunction() {
        let query = parser().parse("bookName:java-programming").unwrap();
        assert_eq!(
            query.description(),
            "bookName:java bookName:programming"
        );
    }
}
