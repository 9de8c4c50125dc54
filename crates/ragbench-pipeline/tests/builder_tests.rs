mod common;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use common::{corpus, doc, ids, keyword_embedder, FailingGenerator, PageGenerator, ScriptedGenerator};
use ragbench_core::config::ExperimentConfig;
use ragbench_core::error::Error;
use ragbench_core::types::{Document, DocumentMeta, GeneratedAnswer, Query, ORACLE_SCORE};
use ragbench_pipeline::{Backends, RagPipeline};

fn query(id: &str, question: &str, sources: &[&str]) -> Query {
    Query { id: id.into(), question: question.into(), sources: sources.iter().map(|s| s.to_string()).collect() }
}

fn config(retrievers: &[&str]) -> ExperimentConfig {
    ExperimentConfig { retrievers: retrievers.iter().map(|r| r.to_string()).collect(), top_k: 3, seed: Some(1), ..ExperimentConfig::default() }
}

fn embedding_backends() -> Backends {
    Backends { embedder: Some(keyword_embedder()), ..Backends::default() }
}

#[test]
fn bm25_only_returns_lexical_evidence() {
    let pipeline = RagPipeline::from_config(&config(&["bm25"]), corpus(), Vec::new(), &Backends::default()).expect("pipeline");
    let outcome = pipeline.run_query(&query("q1", "Rome capital", &[]));
    assert_eq!(outcome.documents.first().map(|d| d.id.as_str()), Some("2"));
    assert!(outcome.documents.len() <= 3);
    assert_eq!(outcome.generated_answer, GeneratedAnswer::Text(String::new()));
}

#[test]
fn oracle_evidence_is_fused_with_bm25() {
    let cfg = ExperimentConfig { join_mode: "concatenate".into(), ..config(&["oracle", "bm25"]) };
    let pipeline = RagPipeline::from_config(&cfg, corpus(), Vec::new(), &Backends::default()).expect("pipeline");
    let outcome = pipeline.run_query(&query("q2", "Berlin", &["a.de/water"]));
    assert_eq!(ids(&outcome.documents), vec!["4", "3"]);
    assert_eq!(outcome.documents[0].score, Some(ORACLE_SCORE));
}

#[test]
fn oracle_without_sources_contributes_nothing() {
    let pipeline = RagPipeline::from_config(&config(&["oracle"]), corpus(), Vec::new(), &Backends::default()).expect("pipeline");
    assert!(pipeline.run_query(&query("q3", "Paris", &[])).documents.is_empty());
}

#[test]
fn dense_and_faq_retrievers_use_the_embedder() {
    let faqs = vec![
        Document::with_meta("Is the tap water in Paris safe?", DocumentMeta::default().with_sources(["a.de/paris-water"])),
        Document::with_meta("Where is the Colosseum?", DocumentMeta::default().with_sources(["a.de/unknown"])),
    ];
    let cfg = ExperimentConfig { faq_path: Some("faq.json".into()), ..config(&["dense", "faq"]) };
    let pipeline = RagPipeline::from_config(&cfg, corpus(), faqs, &embedding_backends()).expect("pipeline");
    let outcome = pipeline.run_query(&query("q4", "paris water", &[]));
    assert_eq!(outcome.documents.first().map(|d| d.id.as_str()), Some("5"));
    let unique: std::collections::HashSet<&str> = ids(&outcome.documents).into_iter().collect();
    assert_eq!(unique.len(), outcome.documents.len());
}

#[test]
fn hyde_retrieves_with_generated_pages() {
    let cfg = ExperimentConfig { hyde_n: 2, ..config(&["hyde"]) };
    let backends = Backends {
        embedder: Some(keyword_embedder()),
        hyde_generator: Some(Arc::new(PageGenerator { pages: vec!["Berlin is big."], calls: AtomicUsize::new(0) })),
        ..Backends::default()
    };
    let pipeline = RagPipeline::from_config(&cfg, corpus(), Vec::new(), &backends).expect("pipeline");
    let outcome = pipeline.run_query(&query("q5", "Which capital has the Brandenburg Gate?", &[]));
    assert_eq!(outcome.documents.first().map(|d| d.id.as_str()), Some("3"));
}

#[test]
fn generation_path_returns_samples() {
    let cfg = ExperimentConfig { use_generator: true, use_reranker: true, reranker: "most_relevant_last".into(), generation_n: 2, ..config(&["bm25"]) };
    let backends = Backends { generator: Some(Arc::new(ScriptedGenerator::new("answer"))), ..Backends::default() };
    let pipeline = RagPipeline::from_config(&cfg, corpus(), Vec::new(), &backends).expect("pipeline");
    assert!(pipeline.graph().has_stage("link_normalizer"));

    let outcome = pipeline.run_query(&query("q6", "Paris water", &[]));
    match outcome.generated_answer {
        GeneratedAnswer::Samples(replies) => assert_eq!(replies.len(), 2),
        other => panic!("expected samples, got {other:?}"),
    }
    // Most relevant last.
    assert_eq!(outcome.documents.last().map(|d| d.id.as_str()), Some("5"));
}

#[test]
fn generation_failure_yields_empty_outcome() {
    let cfg = ExperimentConfig { use_generator: true, generation_n: 3, ..config(&["bm25"]) };
    let backends = Backends { generator: Some(Arc::new(FailingGenerator { fail_on: 0, calls: AtomicUsize::new(0) })), ..Backends::default() };
    let pipeline = RagPipeline::from_config(&cfg, corpus(), Vec::new(), &backends).expect("pipeline");
    let q = query("q7", "Paris", &[]);
    assert!(matches!(pipeline.try_run_query(&q), Err(Error::Generation(_))));
    let outcome = pipeline.run_query(&q);
    assert!(outcome.documents.is_empty());
    assert_eq!(outcome.generated_answer, GeneratedAnswer::default());
}

#[test]
fn missing_backends_are_configuration_errors() {
    let dense = RagPipeline::from_config(&config(&["dense"]), corpus(), Vec::new(), &Backends::default());
    assert!(matches!(dense, Err(Error::InvalidConfiguration(_))));

    let cfg = ExperimentConfig { use_generator: true, ..config(&["bm25"]) };
    assert!(matches!(RagPipeline::from_config(&cfg, corpus(), Vec::new(), &Backends::default()), Err(Error::InvalidConfiguration(_))));

    let cfg = ExperimentConfig { oracle_mode: "psychic".into(), ..config(&["oracle"]) };
    assert!(matches!(RagPipeline::from_config(&cfg, corpus(), Vec::new(), &Backends::default()), Err(Error::InvalidConfiguration(_))));
}

#[test]
fn join_weights_must_match_retrievers() {
    let cfg = ExperimentConfig { join_weights: vec![1.0], ..config(&["bm25", "oracle"]) };
    assert!(matches!(RagPipeline::from_config(&cfg, vec![doc("1", "u", "x")], Vec::new(), &Backends::default()), Err(Error::InvalidConfiguration(_))));
}

#[test]
fn hashing_embedder_drives_dense_retrieval() {
    use ragbench_embed::HashingEmbedder;
    use ragbench_vector::DocumentEmbedder;

    let embedder = Arc::new(DocumentEmbedder::new(Arc::new(HashingEmbedder::new(64))));
    let backends = Backends { embedder: Some(embedder), ..Backends::default() };
    let pipeline = RagPipeline::from_config(&config(&["dense"]), corpus(), Vec::new(), &backends).expect("pipeline");
    let outcome = pipeline.run_query(&query("q8", "Rome is the capital of Italy.", &[]));
    assert_eq!(outcome.documents.first().map(|d| d.id.as_str()), Some("2"));
    assert_eq!(outcome.documents.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn queries_with_generation_run_from_async_code() {
    let cfg = ExperimentConfig { use_generator: true, generation_n: 2, ..config(&["bm25"]) };
    let backends = Backends { generator: Some(Arc::new(ScriptedGenerator::new("answer"))), ..Backends::default() };
    let pipeline = RagPipeline::from_config(&cfg, corpus(), Vec::new(), &backends).expect("pipeline");
    let outcome = pipeline.run_query(&query("q9", "Paris water", &[]));
    assert!(matches!(outcome.generated_answer, GeneratedAnswer::Samples(ref replies) if replies.len() == 2));
    assert!(!outcome.documents.is_empty());
}
