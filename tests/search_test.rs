//! Integration tests for query evaluation, ranking, and snapshot isolation.

use std::sync::Arc;
use std::time::Duration;

use xiphos::analysis::analyzer::standard::StandardAnalyzer;
use xiphos::document::Document;
use xiphos::error::{Result, XiphosError};
use xiphos::index::{IndexWriter, IndexWriterConfig};
use xiphos::query::{BooleanQuery, NumericRangeQuery, Query, QueryParser, TermQuery};
use xiphos::search::IndexSearcher;
use xiphos::storage::{MemoryStorage, Storage};

fn storage() -> Arc<dyn Storage> {
    Arc::new(MemoryStorage::new())
}

fn book(id: i64, name: &str, desc: &str, price: f64) -> Document {
    Document::builder()
        .add_i64("id", id)
        .add_text("bookName", name)
        .add_text("bookDesc", desc)
        .add_f64("bookPrice", price)
        .build()
}

/// The tutorial corpus: a handful of programming books.
fn indexed_corpus(storage: &Arc<dyn Storage>) -> Result<()> {
    let mut writer = IndexWriter::open(storage.clone(), IndexWriterConfig::default())?;
    writer.add_document(book(
        1,
        "Java Programming Thought",
        "The classic deep dive into the Java language",
        71.5,
    ))?;
    writer.add_document(book(
        2,
        "Java Core Technology",
        "Fundamentals of the Java platform",
        56.0,
    ))?;
    writer.add_document(book(
        3,
        "Lucene in Action",
        "Building search applications with Lucene and Java",
        90.0,
    ))?;
    writer.add_document(book(
        4,
        "Solr Guide",
        "Search server built on Lucene",
        78.0,
    ))?;
    writer.commit()?;
    writer.close()?;
    Ok(())
}

#[test]
fn test_term_query_matches_and_projects() -> Result<()> {
    let storage = storage();
    indexed_corpus(&storage)?;

    let searcher = IndexSearcher::open(storage)?;
    let query: Query = TermQuery::new("bookName", "java").into();
    let top = searcher.search(&query, 10)?;

    assert_eq!(top.total_hits, 2);
    for hit in &top.hits {
        let name = hit.fields.get("bookName").unwrap().as_text().unwrap();
        assert!(name.contains("Java"), "unexpected hit {name}");
        assert!(hit.score > 0.0);
    }
    Ok(())
}

#[test]
fn test_term_query_is_exact_not_analyzed() -> Result<()> {
    let storage = storage();
    indexed_corpus(&storage)?;

    let searcher = IndexSearcher::open(storage)?;
    // The index holds lowercase tokens; an unnormalized term silently
    // matches nothing.
    let query: Query = TermQuery::new("bookName", "Java").into();
    assert_eq!(searcher.search(&query, 10)?.total_hits, 0);
    Ok(())
}

#[test]
fn test_numeric_range_boundaries() -> Result<()> {
    let storage = storage();
    {
        let mut writer = IndexWriter::open(storage.clone(), IndexWriterConfig::default())?;
        writer.add_document(book(1, "At Eighty", "boundary low", 80.0))?;
        writer.add_document(book(2, "Mid Nineties", "inside", 95.0))?;
        writer.add_document(book(3, "At Hundred", "boundary high", 100.0))?;
        writer.commit()?;
    }
    let searcher = IndexSearcher::open(storage)?;

    // (80, 100]: excludes exactly 80, includes exactly 100.
    let query: Query =
        NumericRangeQuery::new("bookPrice", Some(80.0), Some(100.0), false, true).into();
    let top = searcher.search(&query, 10)?;
    let ids: Vec<i64> = top
        .hits
        .iter()
        .map(|h| match h.fields.get("id").unwrap() {
            xiphos::document::FieldValue::Integer(i) => *i,
            other => panic!("unexpected id value {other:?}"),
        })
        .collect();
    assert_eq!(top.total_hits, 2);
    assert!(ids.contains(&2) && ids.contains(&3));

    // [80, 100): the mirror image.
    let query: Query =
        NumericRangeQuery::new("bookPrice", Some(80.0), Some(100.0), true, false).into();
    let top = searcher.search(&query, 10)?;
    assert_eq!(top.total_hits, 2);
    let names: Vec<&str> = top
        .hits
        .iter()
        .map(|h| h.fields.get("bookName").unwrap().as_text().unwrap())
        .collect();
    assert!(names.contains(&"At Eighty"));
    assert!(!names.contains(&"At Hundred"));

    // Open-ended range.
    let query: Query = NumericRangeQuery::at_least("bookPrice", 95.0).into();
    assert_eq!(searcher.search(&query, 10)?.total_hits, 2);
    Ok(())
}

#[test]
fn test_boolean_must_term_and_range() -> Result<()> {
    // Two java books, only one priced inside [80, 100]; MUST term + MUST
    // range returns exactly that one.
    let storage = storage();
    {
        let mut writer = IndexWriter::open(storage.clone(), IndexWriterConfig::default())?;
        writer.add_document(book(1, "Java Performance", "d1", 90.0))?;
        writer.add_document(book(2, "Java Puzzlers", "d2", 50.0))?;
        writer.commit()?;
    }
    let searcher = IndexSearcher::open(storage)?;

    let mut query = BooleanQuery::new();
    query.add_must(TermQuery::new("bookName", "java"));
    query.add_must(NumericRangeQuery::new(
        "bookPrice",
        Some(80.0),
        Some(100.0),
        true,
        true,
    ));
    let top = searcher.search(&query.into(), 10)?;

    assert_eq!(top.total_hits, 1);
    assert_eq!(
        top.hits[0].fields.get("bookName").unwrap().as_text(),
        Some("Java Performance")
    );
    Ok(())
}

#[test]
fn test_boolean_must_not_filters() -> Result<()> {
    let storage = storage();
    indexed_corpus(&storage)?;
    let searcher = IndexSearcher::open(storage)?;

    let mut query = BooleanQuery::new();
    query.add_must(TermQuery::new("bookDesc", "java"));
    query.add_must_not(TermQuery::new("bookName", "lucene"));
    let top = searcher.search(&query.into(), 10)?;

    assert_eq!(top.total_hits, 2);
    for hit in &top.hits {
        let name = hit.fields.get("bookName").unwrap().as_text().unwrap();
        assert!(!name.contains("Lucene"));
    }
    Ok(())
}

#[test]
fn test_boolean_only_must_not_is_live_complement() -> Result<()> {
    let storage = storage();
    indexed_corpus(&storage)?;

    // Tombstone one document so the complement is restricted to live docs.
    let mut writer = IndexWriter::open(storage.clone(), IndexWriterConfig::default())?;
    writer.delete_documents(&xiphos::index::Term::new("bookName", "solr"))?;
    writer.commit()?;
    writer.close()?;

    let searcher = IndexSearcher::open(storage)?;
    let mut query = BooleanQuery::new();
    query.add_must_not(TermQuery::new("bookName", "java"));
    let top = searcher.search(&query.into(), 10)?;

    // Four docs, one deleted, two match "java": complement is Lucene in
    // Action alone.
    assert_eq!(top.total_hits, 1);
    assert_eq!(
        top.hits[0].fields.get("bookName").unwrap().as_text(),
        Some("Lucene in Action")
    );
    Ok(())
}

#[test]
fn test_boolean_should_requires_one_match() -> Result<()> {
    let storage = storage();
    indexed_corpus(&storage)?;
    let searcher = IndexSearcher::open(storage)?;

    // MUST bookDesc:search plus SHOULDs that only some candidates satisfy.
    let mut query = BooleanQuery::new();
    query.add_must(TermQuery::new("bookDesc", "search"));
    query.add_should(TermQuery::new("bookName", "solr"));
    query.add_should(TermQuery::new("bookName", "lucene"));
    let top = searcher.search(&query.into(), 10)?;

    // Both "search" docs also match a SHOULD here.
    assert_eq!(top.total_hits, 2);

    // With a SHOULD nothing satisfies, the MUST matches are filtered out.
    let mut query = BooleanQuery::new();
    query.add_must(TermQuery::new("bookDesc", "search"));
    query.add_should(TermQuery::new("bookName", "nonexistent"));
    assert_eq!(searcher.search(&query.into(), 10)?.total_hits, 0);
    Ok(())
}

#[test]
fn test_stored_fields_round_trip_verbatim() -> Result<()> {
    let storage = storage();
    indexed_corpus(&storage)?;
    let searcher = IndexSearcher::open(storage)?;

    let query: Query = TermQuery::new("bookName", "solr").into();
    let top = searcher.search(&query, 1)?;
    let fields = &top.hits[0].fields;

    // Original casing and full text: no analysis applied to projection.
    assert_eq!(
        fields.get("bookName").unwrap().as_text(),
        Some("Solr Guide")
    );
    assert_eq!(
        fields.get("bookDesc").unwrap().as_text(),
        Some("Search server built on Lucene")
    );
    assert_eq!(fields.get("bookPrice").unwrap().as_f64(), Some(78.0));
    assert_eq!(
        fields.get("id").unwrap(),
        &xiphos::document::FieldValue::Integer(4)
    );
    Ok(())
}

#[test]
fn test_ranking_deterministic_with_doc_id_tiebreak() -> Result<()> {
    let storage = storage();
    {
        // Identical documents tie on score; order must be by ascending id.
        let mut writer = IndexWriter::open(storage.clone(), IndexWriterConfig::default())?;
        for id in 0..5 {
            writer.add_document(book(id, "Same Book", "identical text", 10.0))?;
        }
        writer.commit()?;
    }
    let searcher = IndexSearcher::open(storage)?;
    let query: Query = TermQuery::new("bookName", "book").into();

    let first = searcher.search(&query, 10)?;
    let doc_ids: Vec<u64> = first.hits.iter().map(|h| h.doc_id).collect();
    assert_eq!(doc_ids, vec![0, 1, 2, 3, 4], "ties break by doc id");

    for _ in 0..3 {
        let again = searcher.search(&query, 10)?;
        let ids: Vec<u64> = again.hits.iter().map(|h| h.doc_id).collect();
        let scores: Vec<u32> = again.hits.iter().map(|h| h.score.to_bits()).collect();
        assert_eq!(ids, doc_ids);
        assert_eq!(
            scores,
            first.hits.iter().map(|h| h.score.to_bits()).collect::<Vec<_>>(),
            "bit-identical scores on an unchanged snapshot"
        );
    }
    Ok(())
}

#[test]
fn test_higher_term_frequency_ranks_first() -> Result<()> {
    let storage = storage();
    {
        let mut writer = IndexWriter::open(storage.clone(), IndexWriterConfig::default())?;
        writer.add_document(book(1, "Java", "java once", 10.0))?;
        writer.add_document(book(2, "Java Java Java", "java everywhere java java", 10.0))?;
        writer.commit()?;
    }
    let searcher = IndexSearcher::open(storage)?;
    let query: Query = TermQuery::new("bookName", "java").into();
    let top = searcher.search(&query, 10)?;

    assert_eq!(top.total_hits, 2);
    assert_eq!(
        top.hits[0].fields.get("bookName").unwrap().as_text(),
        Some("Java Java Java")
    );
    assert!(top.hits[0].score > top.hits[1].score);
    Ok(())
}

#[test]
fn test_total_hits_not_capped_by_top_n() -> Result<()> {
    let storage = storage();
    indexed_corpus(&storage)?;
    let searcher = IndexSearcher::open(storage)?;

    let query: Query = TermQuery::new("bookDesc", "java").into();
    let top = searcher.search(&query, 1)?;
    assert_eq!(top.hits.len(), 1);
    assert!(top.total_hits > 1);
    Ok(())
}

#[test]
fn test_snapshot_isolation_and_refresh() -> Result<()> {
    let storage = storage();
    indexed_corpus(&storage)?;

    let searcher = IndexSearcher::open(storage.clone())?;
    assert_eq!(searcher.num_docs(), 4);

    // A concurrent writer commits a fifth book.
    let mut writer = IndexWriter::open(storage.clone(), IndexWriterConfig::default())?;
    writer.add_document(book(5, "Elasticsearch in Action", "distributed search", 88.0))?;
    writer.commit()?;
    writer.close()?;

    // The open searcher still observes its open-time snapshot.
    let query: Query = TermQuery::new("bookName", "elasticsearch").into();
    assert_eq!(searcher.search(&query, 10)?.total_hits, 0);
    assert_eq!(searcher.num_docs(), 4);

    // Refresh swaps to the latest durable generation.
    assert!(searcher.refresh()?);
    assert_eq!(searcher.search(&query, 10)?.total_hits, 1);
    assert_eq!(searcher.num_docs(), 5);

    // Refresh with no new commit is a no-op.
    assert!(!searcher.refresh()?);
    Ok(())
}

#[test]
fn test_parsed_expression_end_to_end() -> Result<()> {
    let storage = storage();
    indexed_corpus(&storage)?;
    let searcher = IndexSearcher::open(storage)?;

    let parser = QueryParser::new("bookName", Arc::new(StandardAnalyzer::new()));

    // The tutorial's query: required java, forbidden lucene.
    let query = parser.parse("bookName:java NOT bookName:lucene")?;
    let top = searcher.search(&query, 10)?;
    assert_eq!(top.total_hits, 2);
    for hit in &top.hits {
        let name = hit.fields.get("bookName").unwrap().as_text().unwrap();
        assert!(name.contains("Java"));
    }

    // Parser normalizes case through the analyzer.
    let query = parser.parse("bookName:JAVA AND bookName:Core")?;
    let top = searcher.search(&query, 10)?;
    assert_eq!(top.total_hits, 1);
    assert_eq!(
        top.hits[0].fields.get("bookName").unwrap().as_text(),
        Some("Java Core Technology")
    );

    // Malformed input fails loudly, with the offending offset.
    match parser.parse("bookName:") {
        Err(XiphosError::Parse { offset, .. }) => assert_eq!(offset, 8),
        other => panic!("expected parse error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_search_deadline_times_out() -> Result<()> {
    let storage = storage();
    indexed_corpus(&storage)?;
    let searcher = IndexSearcher::open(storage)?;

    let query: Query = TermQuery::new("bookName", "java").into();
    match searcher.search_with_deadline(&query, 10, Duration::ZERO) {
        Err(XiphosError::Timeout(_)) => {}
        other => panic!("expected timeout, got {other:?}"),
    }

    // A generous deadline succeeds.
    let top = searcher.search_with_deadline(&query, 10, Duration::from_secs(30))?;
    assert_eq!(top.total_hits, 2);
    Ok(())
}

#[test]
fn test_deleted_docs_excluded_from_all_queries() -> Result<()> {
    let storage = storage();
    indexed_corpus(&storage)?;

    let mut writer = IndexWriter::open(storage.clone(), IndexWriterConfig::default())?;
    writer.delete_documents(&xiphos::index::Term::new("bookName", "java"))?;
    writer.commit()?;
    writer.close()?;

    let searcher = IndexSearcher::open(storage)?;

    let term: Query = TermQuery::new("bookName", "java").into();
    assert_eq!(searcher.search(&term, 10)?.total_hits, 0);

    let range: Query = NumericRangeQuery::new("bookPrice", None, Some(75.0), false, true).into();
    assert_eq!(
        searcher.search(&range, 10)?.total_hits,
        0,
        "both cheap books were the tombstoned java ones"
    );
    Ok(())
}

#[test]
fn test_multi_segment_search_merges_results() -> Result<()> {
    let storage = storage();
    let mut writer = IndexWriter::open(storage.clone(), IndexWriterConfig::default())?;
    writer.add_document(book(1, "Java Programming Thought", "first segment", 71.5))?;
    writer.commit()?;
    writer.add_document(book(2, "Java Core Technology", "second segment", 56.0))?;
    writer.commit()?;
    writer.close()?;

    let searcher = IndexSearcher::open(storage)?;
    let query: Query = TermQuery::new("bookName", "java").into();
    let top = searcher.search(&query, 10)?;

    assert_eq!(top.total_hits, 2);
    // Searcher-level ids are segment base + local id.
    assert_eq!(top.hits.iter().map(|h| h.doc_id).collect::<Vec<_>>(), vec![0, 1]);
    Ok(())
}
