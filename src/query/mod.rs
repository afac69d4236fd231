//! Query model: the algebraic representation of search conditions.
//!
//! [`Query`] is a sum type over the supported conditions (exact term match,
//! numeric range, boolean composition), evaluated by one exhaustive
//! match in the searcher. Textual expressions are turned into queries by
//! [`parser::QueryParser`].

use std::fmt;

pub mod parser;

pub use parser::QueryParser;

/// A search query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Exact single-token match against one field.
    Term(TermQuery),
    /// Numeric range match against one field's sortable numeric index.
    NumericRange(NumericRangeQuery),
    /// Boolean composition of sub-queries.
    Boolean(BooleanQuery),
}

impl Query {
    /// Get a human-readable description of this query.
    pub fn description(&self) -> String {
        match self {
            Query::Term(q) => q.description(),
            Query::NumericRange(q) => q.description(),
            Query::Boolean(q) => q.description(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl From<TermQuery> for Query {
    fn from(query: TermQuery) -> Self {
        Query::Term(query)
    }
}

impl From<NumericRangeQuery> for Query {
    fn from(query: NumericRangeQuery) -> Self {
        Query::NumericRange(query)
    }
}

impl From<BooleanQuery> for Query {
    fn from(query: BooleanQuery) -> Self {
        Query::Boolean(query)
    }
}

/// A query that matches documents containing a specific term.
///
/// Like the classic engines, a term query performs exact matching and does
/// NOT analyze its text: the token must already be in normalized form.
/// Use [`QueryParser`] to normalize query strings first.
#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    /// The field to search in.
    pub field: String,
    /// The normalized token to search for.
    pub text: String,
    /// The boost factor for this query.
    pub boost: f32,
}

impl TermQuery {
    /// Create a new term query.
    pub fn new<F, T>(field: F, text: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        TermQuery {
            field: field.into(),
            text: text.into(),
            boost: 1.0,
        }
    }

    /// Set the boost factor.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Get a human-readable description of this query.
    pub fn description(&self) -> String {
        if self.boost == 1.0 {
            format!("{}:{}", self.field, self.text)
        } else {
            format!("{}:{}^{}", self.field, self.text, self.boost)
        }
    }
}

/// A query matching documents whose numeric field value lies in a range.
///
/// Either end may be unbounded. Inclusivity is controlled per bound, so
/// `(80, 100]` and `[80, 100)` are both expressible.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericRangeQuery {
    /// The field to search in.
    pub field: String,
    /// Lower bound; `None` means unbounded.
    pub min: Option<f64>,
    /// Upper bound; `None` means unbounded.
    pub max: Option<f64>,
    /// Whether the lower bound itself matches.
    pub min_inclusive: bool,
    /// Whether the upper bound itself matches.
    pub max_inclusive: bool,
    /// The boost factor for this query.
    pub boost: f32,
}

impl NumericRangeQuery {
    /// Create a new numeric range query.
    pub fn new<F: Into<String>>(
        field: F,
        min: Option<f64>,
        max: Option<f64>,
        min_inclusive: bool,
        max_inclusive: bool,
    ) -> Self {
        NumericRangeQuery {
            field: field.into(),
            min,
            max,
            min_inclusive,
            max_inclusive,
            boost: 1.0,
        }
    }

    /// Range matching values `>= min` (unbounded above).
    pub fn at_least<F: Into<String>>(field: F, min: f64) -> Self {
        Self::new(field, Some(min), None, true, false)
    }

    /// Range matching values `<= max` (unbounded below).
    pub fn at_most<F: Into<String>>(field: F, max: f64) -> Self {
        Self::new(field, None, Some(max), false, true)
    }

    /// Set the boost factor.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Get a human-readable description of this query.
    pub fn description(&self) -> String {
        let open = if self.min_inclusive { '[' } else { '{' };
        let close = if self.max_inclusive { ']' } else { '}' };
        let min = self
            .min
            .map(|v| v.to_string())
            .unwrap_or_else(|| "*".to_string());
        let max = self
            .max
            .map(|v| v.to_string())
            .unwrap_or_else(|| "*".to_string());
        format!("{}:{open}{min} TO {max}{close}", self.field)
    }
}

/// Occurrence requirements for boolean clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// The clause must match (equivalent to AND).
    Must,
    /// The clause should match (equivalent to OR).
    Should,
    /// The clause must not match (equivalent to NOT).
    MustNot,
}

/// A clause in a boolean query.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanClause {
    /// The query for this clause.
    pub query: Query,
    /// The occurrence requirement.
    pub occur: Occur,
}

impl BooleanClause {
    /// Create a new boolean clause.
    pub fn new(query: Query, occur: Occur) -> Self {
        BooleanClause { query, occur }
    }
}

/// A boolean query that combines multiple queries.
///
/// A document matches iff it matches every MUST clause, matches no MUST_NOT
/// clause, and, when at least one SHOULD clause exists, matches at least
/// one SHOULD clause. A query holding only MUST_NOT clauses matches the
/// complement of their union, restricted to live documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BooleanQuery {
    clauses: Vec<BooleanClause>,
}

impl BooleanQuery {
    /// Create a new empty boolean query.
    pub fn new() -> Self {
        BooleanQuery::default()
    }

    /// Add a clause to this boolean query.
    pub fn add_clause(&mut self, clause: BooleanClause) {
        self.clauses.push(clause);
    }

    /// Add a MUST clause.
    pub fn add_must<Q: Into<Query>>(&mut self, query: Q) {
        self.add_clause(BooleanClause::new(query.into(), Occur::Must));
    }

    /// Add a SHOULD clause.
    pub fn add_should<Q: Into<Query>>(&mut self, query: Q) {
        self.add_clause(BooleanClause::new(query.into(), Occur::Should));
    }

    /// Add a MUST_NOT clause.
    pub fn add_must_not<Q: Into<Query>>(&mut self, query: Q) {
        self.add_clause(BooleanClause::new(query.into(), Occur::MustNot));
    }

    /// Get the clauses in insertion order.
    pub fn clauses(&self) -> &[BooleanClause] {
        &self.clauses
    }

    /// Get clauses with the given occurrence kind.
    pub fn clauses_by_occur(&self, occur: Occur) -> impl Iterator<Item = &BooleanClause> {
        self.clauses.iter().filter(move |c| c.occur == occur)
    }

    /// Check if this query has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Get a human-readable description of this query.
    pub fn description(&self) -> String {
        let parts: Vec<String> = self
            .clauses
            .iter()
            .map(|clause| {
                let prefix = match clause.occur {
                    Occur::Must => "+",
                    Occur::Should => "",
                    Occur::MustNot => "-",
                };
                match &clause.query {
                    Query::Boolean(inner) => format!("{prefix}({})", inner.description()),
                    query => format!("{prefix}{}", query.description()),
                }
            })
            .collect();
        parts.join(" ")
    }
}
