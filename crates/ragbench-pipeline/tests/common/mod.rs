#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use ragbench_core::error::Result;
use ragbench_core::ports::Ports;
use ragbench_core::traits::{Embedder, Generator, Stage};
use ragbench_core::types::{ChatMessage, Document, DocumentMeta};
use ragbench_vector::DocumentEmbedder;

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
    Document::with_meta(content, DocumentMeta::default().with_url(url).with_extra("og:title", format!("Page {id}"))).with_id(id)
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

pub fn ids(docs: &[Document]) -> Vec<&str> { docs.iter().map(|d| d.id.as_str()).collect() }

/// Replies `"<prefix> #<call>"`; counts calls.
pub struct ScriptedGenerator { pub prefix: String, pub calls: AtomicUsize }

impl ScriptedGenerator {
    pub fn new(prefix: &str) -> Self { Self { prefix: prefix.into(), calls: AtomicUsize::new(0) } }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} #{call}", self.prefix))
    }
}

/// Replies with the next page from a fixed list, cycling.
pub struct PageGenerator { pub pages: Vec<&'static str>, pub calls: AtomicUsize }

impl Generator for PageGenerator {
    fn generate(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages[call % self.pages.len()].to_string())
    }
}

/// The first call is slow, every later call returns at once.
pub struct SlowFirstGenerator { pub calls: AtomicUsize }

impl Generator for SlowFirstGenerator {
    fn generate(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            std::thread::sleep(Duration::from_millis(300));
            return Ok("slow".into());
        }
        Ok(format!("fast {call}"))
    }
}

/// Fails from the given call on.
pub struct FailingGenerator { pub fail_on: usize, pub calls: AtomicUsize }

impl Generator for FailingGenerator {
    fn generate(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.fail_on { bail!("upstream timed out"); }
        Ok(format!("reply {call}"))
    }
}

/// Test stage built from a closure.
pub struct FnStage<F>(pub F);

impl<F> Stage for FnStage<F>
where
    F: Fn(Ports) -> Result<Ports> + Send + Sync,
{
    fn run(&self, inputs: Ports) -> Result<Ports> { (self.0)(inputs) }
}

/// Wraps a closure so its signature is inferred from the stage bound.
pub fn stage<F>(f: F) -> FnStage<F>
where
    F: Fn(Ports) -> Result<Ports> + Send + Sync,
{
    FnStage(f)
}
