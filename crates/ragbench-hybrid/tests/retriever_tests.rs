mod common;

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use common::{corpus, ids, store};
use ragbench_core::error::Error;
use ragbench_core::filter::Filter;
use ragbench_core::ports::Ports;
use ragbench_core::traits::Stage;
use ragbench_core::types::{Document, ORACLE_SCORE};
use ragbench_hybrid::{DocumentStore, LexicalRetriever, RetrievalMode};
use ragbench_vector::Similarity;

fn retriever(mode: &str) -> LexicalRetriever {
    LexicalRetriever::new(store(), mode).expect("retriever").with_top_k(3).with_seed(7)
}

#[test]
fn unknown_mode_fails_at_construction() {
    let err = LexicalRetriever::new(store(), "oracle_magic").err().expect("must fail");
    assert!(matches!(err, Error::InvalidConfiguration(_)));
    assert_eq!("oracle_random".parse::<RetrievalMode>().expect("parse"), RetrievalMode::OracleRandom);
}

#[test]
fn default_mode_is_lexical_search() {
    let r = retriever("default");
    let docs = r.retrieve("capital", None, None, None).expect("retrieve");
    assert_eq!(docs.len(), 3);
    assert!(docs.iter().all(|d| ["1", "2", "3"].contains(&d.id.as_str())));
}

#[test]
fn oracle_ignores_query_and_scores_sentinel() {
    let r = retriever("oracle");
    let f = Filter::for_sources(&["a.de/berlin", "a.de/paris"]);
    let docs = r.retrieve("anything at all", Some(&f), None, None).expect("retrieve");
    assert_eq!(ids(&docs), vec!["1", "3"]);
    assert!(docs.iter().all(|d| d.score == Some(ORACLE_SCORE)));
}

#[test]
fn oracle_without_filter_is_empty() {
    let r = retriever("oracle");
    assert!(r.retrieve("paris", None, None, None).expect("none").is_empty());
    assert!(r.retrieve("paris", Some(&Filter::empty()), None, None).expect("empty").is_empty());
}

#[test]
fn instance_filter_is_used_when_call_has_none() {
    let r = retriever("oracle").with_filters(Filter::eq("id", "4"));
    assert_eq!(ids(&r.retrieve("", None, None, None).expect("retrieve")), vec!["4"]);
    let f = Filter::eq("id", "5");
    assert_eq!(ids(&r.retrieve("", Some(&f), None, None).expect("retrieve")), vec!["5"]);
}

#[test]
fn oracle_related_puts_oracle_first_and_backfills_without_duplicates() {
    let r = retriever("oracle_related");
    let f = Filter::for_sources(&["a.de/paris"]);
    let docs = r.retrieve("paris water", Some(&f), Some(3), None).expect("retrieve");
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[0].id, "1");
    assert_eq!(docs[0].score, Some(ORACLE_SCORE));
    let unique: HashSet<&str> = ids(&docs).into_iter().collect();
    assert_eq!(unique.len(), 3);
    assert!(docs[1..].iter().all(|d| d.score.is_some_and(|s| s < ORACLE_SCORE)));
}

#[test]
fn oracle_related_with_full_oracle_pool_adds_nothing() {
    let r = retriever("oracle_related");
    let f = Filter::for_sources(&["a.de/paris", "a.de/rome"]);
    let docs = r.retrieve("water", Some(&f), Some(2), None).expect("retrieve");
    assert_eq!(ids(&docs), vec!["1", "2"]);
}

#[test]
fn oracle_random_backfills_with_random_scores() {
    let r = retriever("oracle_random");
    let f = Filter::eq("id", "3");
    let docs = r.retrieve("", Some(&f), Some(4), None).expect("retrieve");
    assert_eq!(docs.len(), 4);
    assert_eq!(docs[0].id, "3");
    let unique: HashSet<&str> = ids(&docs).into_iter().collect();
    assert_eq!(unique.len(), 4);
    assert!(docs[1..].iter().all(|d| d.score.is_some_and(|s| s > 0.0 && s <= 1.0)));
}

#[test]
fn random_is_capped_at_store_size() {
    let r = retriever("random");
    let docs = r.retrieve("", None, Some(50), None).expect("retrieve");
    assert_eq!(docs.len(), corpus().len());
}

#[test]
fn seeded_random_is_reproducible() {
    let a = retriever("random").retrieve("", None, Some(3), None).expect("a");
    let b = retriever("random").retrieve("", None, Some(3), None).expect("b");
    assert_eq!(ids(&a), ids(&b));
    assert_eq!(a.iter().map(|d| d.score).collect::<Vec<_>>(), b.iter().map(|d| d.score).collect::<Vec<_>>());
}

#[test]
fn stage_reads_query_filters_and_top_k() {
    let r = retriever("oracle_related");
    let inputs = Ports::new()
        .with("query", "capital")
        .with("filters", Filter::eq("id", "4"))
        .with("top_k", 2usize);
    let mut out = r.run(inputs).expect("run");
    let docs = out.take_documents("documents").expect("documents").expect("present");
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].id, "4");
}

fn store_of(n: usize) -> Arc<DocumentStore> {
    let mut store = DocumentStore::new(Similarity::Cosine).expect("store");
    let docs: Vec<Document> = (0..n).map(|i| Document::new(format!("doc {i} about topic{}", i % 3)).with_id(format!("d{i}"))).collect();
    store.write(docs).expect("write");
    Arc::new(store)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn random_returns_distinct_ids_with_strictly_descending_scores(n in 1usize..25, extra in 0usize..5, seed in any::<u64>()) {
        let r = LexicalRetriever::new(store_of(n), "random").expect("retriever").with_seed(seed);
        let docs = r.retrieve("", None, Some(n + extra), None).expect("retrieve");
        prop_assert_eq!(docs.len(), n);
        let unique: HashSet<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        prop_assert_eq!(unique.len(), n);
        for pair in docs.windows(2) {
            prop_assert!(pair[0].score > pair[1].score);
        }
        prop_assert!(docs.iter().all(|d| d.score.is_some_and(|s| s > 0.0 && s <= 1.0)));
    }

    #[test]
    fn oracle_related_never_exceeds_top_k(n in 1usize..20, oracle_ids in proptest::collection::vec(0usize..20, 0..8), top_k in 0usize..10) {
        let store = store_of(n);
        let conditions: Vec<Filter> = oracle_ids.iter().map(|i| Filter::eq("id", format!("d{i}"))).collect();
        let f = Filter::any_of(conditions);
        let r = LexicalRetriever::new(store.clone(), "oracle_related").expect("retriever");
        let docs = r.retrieve("doc topic1", Some(&f), Some(top_k), None).expect("retrieve");
        prop_assert!(docs.len() <= top_k);
        let unique: HashSet<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        prop_assert_eq!(unique.len(), docs.len());
        let first_backfill = docs.iter().position(|d| d.score != Some(ORACLE_SCORE)).unwrap_or(docs.len());
        prop_assert!(docs[first_backfill..].iter().all(|d| d.score != Some(ORACLE_SCORE)));
    }

    #[test]
    fn oracle_matches_store_filter(n in 1usize..20, picks in proptest::collection::vec(0usize..25, 0..6)) {
        let store = store_of(n);
        let f = Filter::any_of(picks.iter().map(|i| Filter::eq("id", format!("d{i}"))).collect());
        let r = LexicalRetriever::new(store.clone(), "oracle").expect("retriever");
        let docs = r.retrieve("ignored", Some(&f), Some(100), None).expect("retrieve");
        let expected: Vec<String> = store.filter(Some(&f)).into_iter().map(|d| d.id).collect();
        prop_assert_eq!(docs.iter().map(|d| d.id.clone()).collect::<Vec<_>>(), expected);
        prop_assert!(docs.iter().all(|d| d.score == Some(ORACLE_SCORE)));
    }
}
