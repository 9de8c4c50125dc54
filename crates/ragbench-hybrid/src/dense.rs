use std::sync::Arc;
use tracing::debug;

use ragbench_core::error::Result;
use ragbench_core::filter::Filter;
use ragbench_core::ports::Ports;
use ragbench_core::traits::Stage;
use ragbench_core::types::Document;
use ragbench_vector::DocumentEmbedder;

use crate::store::DocumentStore;

/// Turns `text` into an `embedding`.
pub struct TextEmbedderStage {
    embedder: Arc<DocumentEmbedder>,
}

impl TextEmbedderStage {
    pub fn new(embedder: Arc<DocumentEmbedder>) -> Self { Self { embedder } }
}

impl Stage for TextEmbedderStage {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let text = inputs.require_text("text")?;
        let embedding = self.embedder.embed_query(&text)?;
        Ok(Ports::new().with("embedding", embedding))
    }
}

/// Vector search against a store using an already computed query vector.
pub struct EmbeddingRetriever {
    store: Arc<DocumentStore>,
    filters: Option<Filter>,
    top_k: usize,
    scale_score: bool,
}

impl EmbeddingRetriever {
    pub fn new(store: Arc<DocumentStore>) -> Self { Self { store, filters: None, top_k: 10, scale_score: false } }

    pub fn with_top_k(mut self, top_k: usize) -> Self { self.top_k = top_k; self }
    pub fn with_filters(mut self, filters: Filter) -> Self { self.filters = Some(filters); self }
    pub fn with_scale_score(mut self, scale_score: bool) -> Self { self.scale_score = scale_score; self }

    pub fn retrieve(&self, query_embedding: &[f32], filters: Option<&Filter>, top_k: Option<usize>, scale_score: Option<bool>) -> Result<Vec<Document>> {
        let docs = self.store.vector_search(
            query_embedding,
            top_k.unwrap_or(self.top_k),
            filters.or(self.filters.as_ref()),
            scale_score.unwrap_or(self.scale_score),
        )?;
        debug!(count = docs.len(), "embedding retrieval");
        Ok(docs)
    }
}

impl Stage for EmbeddingRetriever {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let query_embedding = inputs.require_embedding("query_embedding")?;
        let filters = inputs.take_filter("filters")?;
        let top_k = inputs.take_count("top_k")?;
        let scale_score = inputs.take_flag("scale_score")?;
        let docs = self.retrieve(&query_embedding, filters.as_ref(), top_k, scale_score)?;
        Ok(Ports::new().with("documents", docs))
    }
}
