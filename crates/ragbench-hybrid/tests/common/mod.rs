#![allow(dead_code)]

use std::sync::Arc;

use ragbench_core::traits::Embedder;
use ragbench_core::types::{Document, DocumentMeta};
use ragbench_hybrid::DocumentStore;
use ragbench_vector::{DocumentEmbedder, Similarity};

/// One axis per keyword; a text's vector counts keyword hits.
pub struct KeywordEmbedder { pub keywords: Vec<&'static str> }

impl Embedder for KeywordEmbedder {
    fn id(&self) -> &str { "keywords" }
    fn dim(&self) -> usize { self.keywords.len() }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                self.keywords.iter().map(|k| lower.matches(k).count() as f32).collect()
            })
            .collect())
    }
}

pub fn keyword_embedder() -> Arc<DocumentEmbedder> {
    Arc::new(DocumentEmbedder::new(Arc::new(KeywordEmbedder { keywords: vec!["paris", "rome", "berlin", "water"] })))
}

pub fn doc(id: &str, url: &str, content: &str) -> Document {
    Document::with_meta(content, DocumentMeta::default().with_url(url)).with_id(id)
}

pub fn corpus() -> Vec<Document> {
    vec![
        doc("1", "a.de/paris", "Paris is the capital of France."),
        doc("2", "a.de/rome", "Rome is the capital of Italy."),
        doc("3", "a.de/berlin", "Berlin is the capital of Germany."),
        doc("4", "a.de/water", "Drinking water should be boiled."),
        doc("5", "a.de/paris-water", "Paris tap water is safe to drink."),
    ]
}

pub fn store() -> Arc<DocumentStore> {
    let mut store = DocumentStore::new(Similarity::Cosine).expect("store");
    store.write(corpus()).expect("write");
    Arc::new(store)
}

pub fn embedded_store() -> Arc<DocumentStore> {
    let mut docs = corpus();
    keyword_embedder().embed_documents(&mut docs).expect("embed");
    let mut store = DocumentStore::new(Similarity::Cosine).expect("store");
    store.write(docs).expect("write");
    Arc::new(store)
}

pub fn ids(docs: &[Document]) -> Vec<&str> { docs.iter().map(|d| d.id.as_str()).collect() }
