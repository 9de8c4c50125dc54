//! Batched embedding of documents and queries through the cache.
use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::info;

use ragbench_core::traits::Embedder;
use ragbench_core::types::Document;

use crate::cache::{hash_content, CacheEntry, EmbeddingCache};

pub struct DocumentEmbedder {
    embedder: Arc<dyn Embedder>,
    cache: Mutex<EmbeddingCache>,
    batch_size: usize,
    show_progress: bool,
}

impl DocumentEmbedder {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder, cache: Mutex::new(EmbeddingCache::in_memory()), batch_size: 32, show_progress: false }
    }

    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self { self.cache = Mutex::new(cache); self }
    pub fn with_batch_size(mut self, batch_size: usize) -> Self { self.batch_size = batch_size.max(1); self }
    pub fn with_progress(mut self, show: bool) -> Self { self.show_progress = show; self }

    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }

    /// Embed texts in order, reusing cached vectors and caching new ones.
    pub fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embedder_id = self.embedder.id().to_string();
        let hashes: Vec<String> = texts.iter().map(|t| hash_content(t)).collect();
        let mut found: HashMap<String, Vec<f32>> = {
            let cache = self.cache.lock().map_err(|_| anyhow::anyhow!("embedding cache lock poisoned"))?;
            cache.get_many(&embedder_id, &hashes)
        };

        let mut missing: Vec<(String, String)> = Vec::new();
        let mut queued = HashSet::new();
        for (text, hash) in texts.iter().zip(&hashes) {
            if !found.contains_key(hash) && queued.insert(hash.clone()) { missing.push((hash.clone(), text.clone())); }
        }

        if !missing.is_empty() {
            let pb = if self.show_progress { ProgressBar::new(missing.len() as u64) } else { ProgressBar::hidden() };
            if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} embeddings ({percent}%)") {
                pb.set_style(style.progress_chars("#>-"));
            }
            let mut fresh = Vec::with_capacity(missing.len());
            for batch in missing.chunks(self.batch_size) {
                let inputs: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
                let vectors = self.embedder.embed_batch(&inputs)?;
                if vectors.len() != inputs.len() { bail!("embedder returned {} vectors for {} texts", vectors.len(), inputs.len()); }
                for ((hash, _), vector) in batch.iter().zip(vectors) {
                    if vector.len() != self.embedder.dim() { bail!("embedder returned {} dims, expected {}", vector.len(), self.embedder.dim()); }
                    found.insert(hash.clone(), vector.clone());
                    fresh.push(CacheEntry { content_hash: hash.clone(), embedder_id: embedder_id.clone(), vector });
                }
                pb.inc(batch.len() as u64);
            }
            pb.finish_and_clear();
            info!(embedded = fresh.len(), cached = texts.len() - fresh.len(), "embedding pass done");
            let mut cache = self.cache.lock().map_err(|_| anyhow::anyhow!("embedding cache lock poisoned"))?;
            cache.put_many(fresh);
        }

        hashes.iter().map(|h| found.get(h).cloned().ok_or_else(|| anyhow::anyhow!("no embedding for content {h}"))).collect()
    }

    pub fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_texts(&[text.to_string()])?;
        out.pop().ok_or_else(|| anyhow::anyhow!("embedder returned nothing"))
    }

    /// Attach embeddings of each document's content.
    pub fn embed_documents(&self, docs: &mut [Document]) -> Result<()> {
        let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embed_texts(&texts)?;
        for (doc, vector) in docs.iter_mut().zip(vectors) { doc.embedding = Some(vector); }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.cache.lock().map_err(|_| anyhow::anyhow!("embedding cache lock poisoned"))?.flush()
    }
}
