//! Rerankers applied after fusion.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::debug;

use ragbench_core::error::{Error, Result};
use ragbench_core::ports::Ports;
use ragbench_core::traits::Stage;
use ragbench_core::types::Document;
use ragbench_vector::{DocumentEmbedder, Similarity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankerKind {
    Similarity,
    MostRelevantFirst,
    MostRelevantLast,
    Random,
}

impl RerankerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Similarity => "similarity",
            Self::MostRelevantFirst => "most_relevant_first",
            Self::MostRelevantLast => "most_relevant_last",
            Self::Random => "random",
        }
    }
}

impl FromStr for RerankerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [Self::Similarity, Self::MostRelevantFirst, Self::MostRelevantLast, Self::Random]
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::config(format!("unknown reranker '{s}'")))
    }
}

impl fmt::Display for RerankerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Cosine similarity between the query and each document's content becomes
/// the new score.
pub struct SimilarityReranker {
    embedder: Arc<DocumentEmbedder>,
    top_k: usize,
}

impl SimilarityReranker {
    pub fn new(embedder: Arc<DocumentEmbedder>) -> Self { Self { embedder, top_k: 10 } }

    pub fn with_top_k(mut self, top_k: usize) -> Self { self.top_k = top_k; self }

    pub fn rerank(&self, query: &str, documents: Vec<Document>, top_k: Option<usize>) -> Result<Vec<Document>> {
        if documents.is_empty() { return Ok(documents); }
        let query_vec = self.embedder.embed_query(query)?;
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embedder.embed_texts(&texts)?;
        let mut scored: Vec<Document> = documents
            .into_iter()
            .zip(vectors)
            .map(|(mut doc, v)| { doc.score = Some(Similarity::Cosine.score(&query_vec, &v)); doc })
            .collect();
        sort_by_score(&mut scored, true);
        scored.truncate(top_k.unwrap_or(self.top_k));
        debug!(count = scored.len(), "similarity rerank");
        Ok(scored)
    }
}

impl Stage for SimilarityReranker {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let query = inputs.require_text("query")?;
        let documents = inputs.take_documents("documents")?.unwrap_or_default();
        let top_k = inputs.take_count("top_k")?;
        Ok(Ports::new().with("documents", self.rerank(&query, documents, top_k)?))
    }
}

/// Reorders by the incoming scores. With `most_relevant_last` the best
/// document sits next to the question in the prompt.
pub struct ScoreOrderReranker {
    descending: bool,
    top_k: Option<usize>,
}

impl ScoreOrderReranker {
    pub fn most_relevant_first() -> Self { Self { descending: true, top_k: None } }
    pub fn most_relevant_last() -> Self { Self { descending: false, top_k: None } }

    pub fn with_top_k(mut self, top_k: usize) -> Self { self.top_k = Some(top_k); self }

    pub fn rerank(&self, mut documents: Vec<Document>, top_k: Option<usize>) -> Vec<Document> {
        sort_by_score(&mut documents, self.descending);
        if let Some(k) = top_k.or(self.top_k) { truncate_keeping_best(&mut documents, k, self.descending); }
        documents
    }
}

impl Stage for ScoreOrderReranker {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let documents = inputs.take_documents("documents")?.unwrap_or_default();
        let top_k = inputs.take_count("top_k")?;
        Ok(Ports::new().with("documents", self.rerank(documents, top_k)))
    }
}

/// Shuffles the documents; a lower bound for order sensitivity.
pub struct RandomReranker {
    rng: Mutex<StdRng>,
    top_k: Option<usize>,
}

impl RandomReranker {
    pub fn new() -> Self { Self { rng: Mutex::new(StdRng::from_entropy()), top_k: None } }

    pub fn with_seed(mut self, seed: u64) -> Self { self.rng = Mutex::new(StdRng::seed_from_u64(seed)); self }
    pub fn with_top_k(mut self, top_k: usize) -> Self { self.top_k = Some(top_k); self }

    pub fn rerank(&self, mut documents: Vec<Document>, top_k: Option<usize>) -> Result<Vec<Document>> {
        let mut rng = self.rng.lock().map_err(|_| Error::Operation("reranker rng lock poisoned".into()))?;
        documents.shuffle(&mut *rng);
        if let Some(k) = top_k.or(self.top_k) { documents.truncate(k); }
        Ok(documents)
    }
}

impl Default for RandomReranker {
    fn default() -> Self { Self::new() }
}

impl Stage for RandomReranker {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let documents = inputs.take_documents("documents")?.unwrap_or_default();
        let top_k = inputs.take_count("top_k")?;
        Ok(Ports::new().with("documents", self.rerank(documents, top_k)?))
    }
}

/// Stable sort; unscored documents rank lowest.
fn sort_by_score(documents: &mut [Document], descending: bool) {
    let key = |d: &Document| d.score.unwrap_or(f64::NEG_INFINITY);
    if descending {
        documents.sort_by(|a, b| key(b).total_cmp(&key(a)));
    } else {
        documents.sort_by(|a, b| key(a).total_cmp(&key(b)));
    }
}

/// Ascending lists drop from the front so the best `k` remain.
fn truncate_keeping_best(documents: &mut Vec<Document>, k: usize, descending: bool) {
    if descending {
        documents.truncate(k);
    } else {
        let excess = documents.len().saturating_sub(k);
        documents.drain(..excess);
    }
}
