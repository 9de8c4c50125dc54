use std::fs;
use tempfile::TempDir;

use ragbench_core::config::{resolve_with_base, Config, ExperimentConfig};
use ragbench_core::filter::Filter;
use ragbench_core::ports::{PortValue, Ports};
use ragbench_core::types::{Document, DocumentMeta, GeneratedAnswer, ParentRef};
use ragbench_core::Error;

#[test]
fn document_without_id_gets_content_hash() {
    let a: Document = serde_json::from_str(r#"{"content": "hello", "meta": {"url": "a.de"}}"#).unwrap();
    let b: Document = serde_json::from_str(r#"{"content": "hello", "meta": {"url": "a.de"}}"#).unwrap();
    let c: Document = serde_json::from_str(r#"{"content": "hello", "meta": {"url": "b.de"}}"#).unwrap();
    assert_eq!(a.id.len(), 64);
    assert_eq!(a.id, b.id);
    assert_ne!(a.id, c.id);

    let explicit: Document = serde_json::from_str(r#"{"id": "d1", "content": "hello"}"#).unwrap();
    assert_eq!(explicit.id, "d1");
}

#[test]
fn meta_reads_links_parents_and_extension_keys() {
    let raw = r#"{
        "id": "faq-1",
        "content": "Q: where?",
        "meta": {
            "url": "a.de/faq",
            "links": {"3": "x.de", "1": "y.de"},
            "parent_id": ["p1", "p2"],
            "og:title": "Title"
        }
    }"#;
    let doc: Document = serde_json::from_str(raw).unwrap();
    let numbers: Vec<u32> = doc.meta.links.keys().copied().collect();
    assert_eq!(numbers, vec![3, 1], "links keep file order");
    assert_eq!(doc.meta.parent_ids.as_ref().map(ParentRef::ids), Some(&["p1".to_string(), "p2".to_string()][..]));
    assert_eq!(doc.meta.extra.get("og:title").and_then(|v| v.as_str()), Some("Title"));

    let single: Document =
        serde_json::from_str(r#"{"content": "x", "meta": {"parent_id": "p9"}}"#).unwrap();
    assert_eq!(single.meta.parent_ids.unwrap().ids(), &["p9".to_string()]);
}

#[test]
fn bad_link_number_is_rejected() {
    let res: Result<Document, _> = serde_json::from_str(r#"{"content": "x", "meta": {"links": {"one": "a.de"}}}"#);
    assert!(res.is_err());
}

#[test]
fn scored_copy_leaves_original_untouched() {
    let doc = Document::new("x").with_score(0.2);
    let copy = doc.scored(0.9);
    assert_eq!(doc.score, Some(0.2));
    assert_eq!(copy.score, Some(0.9));
    assert_eq!(doc.id, copy.id);
}

#[test]
fn source_filter_matches_any_url() {
    let filter = Filter::for_sources(&["a.de", "b.de"]);
    let a = Document::with_meta("x", DocumentMeta::default().with_url("a.de"));
    let c = Document::with_meta("x", DocumentMeta::default().with_url("c.de"));
    assert!(filter.matches(&a));
    assert!(!filter.matches(&c));
    assert!(Filter::for_sources::<&str>(&[]).is_empty());

    let json = serde_json::to_value(&filter).unwrap();
    assert_eq!(json["operator"], "OR");
    assert_eq!(json["conditions"][0]["operator"], "==");
}

#[test]
fn in_and_not_in_operators() {
    let raw = r#"{"field": "id", "operator": "in", "value": ["a", "b"]}"#;
    let inside: Filter = serde_json::from_str(raw).unwrap();
    let raw = r#"{"field": "id", "operator": "not in", "value": ["a", "b"]}"#;
    let outside: Filter = serde_json::from_str(raw).unwrap();
    let a = Document::new("x").with_id("a");
    let z = Document::new("x").with_id("z");
    assert!(inside.matches(&a) && !inside.matches(&z));
    assert!(!outside.matches(&a) && outside.matches(&z));
}

#[test]
fn ports_report_type_mismatch() {
    let mut ports = Ports::new().with("query", 3usize);
    let err = ports.require_text("query").unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration(_)));

    let mut ports = Ports::new();
    assert!(matches!(ports.require_text("query"), Err(Error::InvalidConfiguration(_))));
    assert_eq!(ports.take_text("query").unwrap(), None);
}

#[test]
fn ports_flatten_many_document_lists() {
    let first = vec![Document::new("a")];
    let second = vec![Document::new("b"), Document::new("c")];
    let mut ports = Ports::new().with(
        "documents",
        PortValue::Many(vec![PortValue::Documents(first), PortValue::Documents(second)]),
    );
    let lists = ports.take_document_lists("documents").unwrap();
    assert_eq!(lists.iter().map(Vec::len).collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn generated_answer_serializes_plainly() {
    assert_eq!(serde_json::to_string(&GeneratedAnswer::default()).unwrap(), r#""""#);
    let samples = GeneratedAnswer::Samples(vec!["a".into(), "b".into()]);
    assert_eq!(serde_json::to_string(&samples).unwrap(), r#"["a","b"]"#);
}

#[test]
fn experiment_config_from_file_with_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("run.toml");
    fs::write(
        &path,
        "retrievers = [\"bm25\", \"oracle\"]\njoin_weights = [2.0, 1.0]\ntop_k = 10\nseed = 7\n",
    )
    .unwrap();

    let cfg = Config::from_file(&path).unwrap().experiment().unwrap();
    assert_eq!(cfg.top_k, 10);
    assert_eq!(cfg.retrievers, vec!["bm25", "oracle"]);
    assert_eq!(cfg.weights(), vec![2.0, 1.0]);
    assert_eq!(cfg.seed, Some(7));
    assert_eq!(cfg.join_mode, "reciprocal_rank_fusion");
    assert_eq!(cfg.bm25_k, 50);
    assert_eq!(cfg.faq_k, 1);
}

#[test]
fn experiment_config_rejects_weight_mismatch_and_unknown_retrievers() {
    let cfg = ExperimentConfig { join_weights: vec![1.0, 2.0], ..Default::default() };
    assert!(matches!(cfg.validate(), Err(Error::InvalidConfiguration(_))));

    let cfg = ExperimentConfig { retrievers: vec!["colbert".into()], ..Default::default() };
    assert!(matches!(cfg.validate(), Err(Error::InvalidConfiguration(_))));

    let cfg = ExperimentConfig { retrievers: vec![], ..Default::default() };
    assert!(cfg.validate().is_err());

    assert!(ExperimentConfig::default().validate().is_ok());
    assert_eq!(ExperimentConfig::default().weights(), vec![1.0]);
}

#[test]
fn missing_config_file_is_not_found() {
    assert!(matches!(Config::from_file("/nonexistent/ragbench.toml"), Err(Error::NotFound(_))));
}

#[test]
fn resolve_relative_paths_against_base() {
    let base = std::path::Path::new("/srv/data");
    assert_eq!(resolve_with_base(base, "corpus.json"), base.join("corpus.json"));
    assert_eq!(resolve_with_base(base, "/abs/corpus.json"), std::path::PathBuf::from("/abs/corpus.json"));
}
