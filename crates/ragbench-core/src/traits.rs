use crate::error::Result;
use crate::ports::Ports;
use crate::types::{ChatMessage, Document, SearchHit};

pub trait Embedder: Send + Sync {
    /// Stable identifier of the model, part of every embedding cache key.
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// One chat completion per call; sampling many is layered on top.
pub trait Generator: Send + Sync {
    fn generate(&self, messages: &[ChatMessage]) -> anyhow::Result<String>;
}

/// Lexical index. Hits carry raw engine scores, best first; documents with
/// no relevance to the query are never returned.
pub trait TextIndexer: Send + Sync {
    fn index(&mut self, docs: &[Document]) -> anyhow::Result<()>;
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// Vector index over the embeddings attached to documents. Indexing a known
/// id replaces its vector; indexing it without an embedding removes it.
pub trait VectorIndexer: Send + Sync {
    fn index(&mut self, docs: &[Document]) -> anyhow::Result<()>;
    fn search_vec(&self, query_vec: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// A named unit of work in a pipeline graph.
pub trait Stage: Send + Sync {
    fn run(&self, inputs: Ports) -> Result<Ports>;
}

impl<T: Stage + ?Sized> Stage for Box<T> {
    fn run(&self, inputs: Ports) -> Result<Ports> { (**self).run(inputs) }
}
