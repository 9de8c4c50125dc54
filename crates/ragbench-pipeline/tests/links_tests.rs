use ragbench_core::ports::Ports;
use ragbench_core::traits::Stage;
use ragbench_core::types::{Document, DocumentMeta};
use ragbench_pipeline::{clean_unlinked_references, ContentLinkNormalizer};

fn linked(content: &str, links: &[(u32, &str)]) -> Document {
    Document::with_meta(content, DocumentMeta::default().with_links(links.iter().map(|(n, u)| (*n, *u))))
}

fn normalizer() -> ContentLinkNormalizer { ContentLinkNormalizer::new().expect("normalizer") }

#[test]
fn renumbers_shared_links_across_documents() {
    let docs = vec![
        linked(
            "[ ![][3] link 1][1] This is a test content with a [reference ][1] and [reference ][2]. Inhalt ausklappen",
            &[(1, "https://example.com/link1"), (2, "https://example.com/link2")],
        ),
        linked(
            "Another doc with [reference ][2] and [reference ][999] and [ reference ][1000] [test][25]. Alle Elemente ausklappen",
            &[(2, "https://example.com/link2"), (999, "https://example.com/link999")],
        ),
    ];

    let out = normalizer().normalize(docs).expect("normalize");

    assert_eq!(out[0].content, "[  link 1][0] This is a test content with a [reference ][0] and [reference ][1]. ");
    assert_eq!(out[1].content, "Another doc with [reference ][1] and [reference ][2] and  . ");

    assert_eq!(out[0].meta.links.len(), 2);
    assert_eq!(out[1].meta.links.len(), 2);
    assert_eq!(out[0].meta.links.get(&0).map(String::as_str), Some("https://example.com/link1"));
    assert_eq!(out[0].meta.links.get(&1).map(String::as_str), Some("https://example.com/link2"));
    assert_eq!(out[1].meta.links.get(&1).map(String::as_str), Some("https://example.com/link2"));
    assert_eq!(out[1].meta.links.get(&2).map(String::as_str), Some("https://example.com/link999"));
}

#[test]
fn shared_url_gets_one_number() {
    let a = linked("[x][1] [y][2]", &[(1, "u1"), (2, "u2")]);
    let b = linked("[z][2] [w][999]", &[(2, "u2"), (999, "u3")]);
    let out = normalizer().normalize(vec![a, b]).expect("normalize");
    assert_eq!(out[0].content, "[x][0] [y][1]");
    assert_eq!(out[1].content, "[z][1] [w][2]");
}

#[test]
fn rewritten_numbers_do_not_collide_with_originals() {
    // 2 -> 0, 0 -> 1
    let a = linked("first [a][2] second [b][0]", &[(2, "u2"), (0, "u0")]);
    let out = normalizer().normalize(vec![a]).expect("normalize");
    assert_eq!(out[0].content, "first [a][0] second [b][1]");
    assert_eq!(out[0].meta.links.get(&0).map(String::as_str), Some("u2"));
    assert_eq!(out[0].meta.links.get(&1).map(String::as_str), Some("u0"));
}

#[test]
fn unlinked_description_forms_are_removed() {
    assert_eq!(clean_unlinked_references("[ ![][51] ][90]", "[51]").expect("clean"), "[  ][90]");
    assert_eq!(clean_unlinked_references("[Backward][60]", "[60]").expect("clean"), "");
    for content in ["[ Forward ][60]", "[Forward ][60]", "[ Forward][60]", "[            Forward                               ][60]"] {
        assert_eq!(clean_unlinked_references(content, "[60]").expect("clean"), "", "{content}");
    }
}

#[test]
fn bare_unlinked_marker_is_dropped() {
    assert_eq!(clean_unlinked_references("see [7] here", "[7]").expect("clean"), "see  here");
    let out = normalizer().normalize(vec![linked("[Backward][60]", &[])]).expect("normalize");
    assert_eq!(out[0].content, "");
    assert!(out[0].meta.links.is_empty());
}

#[test]
fn boilerplate_is_configurable() {
    let n = ContentLinkNormalizer::with_boilerplate(["Show more"]).expect("normalizer");
    let out = n.normalize(vec![linked("Text Show more Inhalt ausklappen", &[])]).expect("normalize");
    assert_eq!(out[0].content, "Text  Inhalt ausklappen");
}

#[test]
fn stage_rewrites_documents_port() {
    let inputs = Ports::new().with("documents", vec![linked("[a][5]", &[(5, "u5")])]);
    let mut out = normalizer().run(inputs).expect("run");
    let docs = out.take_documents("documents").expect("docs").expect("some");
    assert_eq!(docs[0].content, "[a][0]");
}

mod properties {
    use super::*;
    use proptest::prelude::*;
    use regex::Regex;

    fn batch() -> impl Strategy<Value = Vec<(Vec<u32>, Vec<u32>)>> {
        // (markers in content, numbers with a link) per document
        prop::collection::vec((prop::collection::vec(0u32..12, 0..8), prop::collection::vec(0u32..12, 0..6)), 1..4)
    }

    proptest! {
        #[test]
        fn every_surviving_marker_is_linked(shape in batch()) {
            let docs: Vec<Document> = shape
                .iter()
                .map(|(markers, links)| {
                    let content: String = markers.iter().map(|n| format!("[word][{n}] ")).collect();
                    Document::with_meta(content, DocumentMeta::default().with_links(links.iter().map(|n| (*n, format!("u{n}")))))
                })
                .collect();
            let out = normalizer().normalize(docs).expect("normalize");
            let marker = Regex::new(r"\[(\d+)\]").expect("regex");
            let mut index_of_url = std::collections::HashMap::new();
            for doc in &out {
                for caps in marker.captures_iter(&doc.content) {
                    let n: u32 = caps[1].parse().expect("number");
                    prop_assert!(doc.meta.links.contains_key(&n), "marker {} without link in {:?}", n, doc.content);
                }
                for (n, url) in &doc.meta.links {
                    let first = *index_of_url.entry(url.clone()).or_insert(*n);
                    prop_assert_eq!(first, *n);
                }
            }
        }
    }
}
