//! Embedding cache keyed by `(content_hash, embedder_id)`.
//!
//! Consulted before calling an embedder and written through on misses.
//! Optionally persisted as JSON so repeated runs skip re-embedding.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_hash: String,
    pub embedder_id: String,
    pub vector: Vec<f32>,
}

pub fn hash_content(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex().to_string()
}

#[derive(Default)]
pub struct EmbeddingCache {
    entries: HashMap<(String, String), Vec<f32>>,
    path: Option<PathBuf>,
    dirty: bool,
}

impl EmbeddingCache {
    pub fn in_memory() -> Self { Self::default() }

    /// Open a JSON-backed cache; a missing file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut cache = Self { path: Some(path.clone()), ..Self::default() };
        if path.exists() {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            let entries: Vec<CacheEntry> = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
            info!(path = %path.display(), count = entries.len(), "embedding cache loaded");
            cache.put_many(entries);
            cache.dirty = false;
        }
        Ok(cache)
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, embedder_id: &str, content_hash: &str) -> Option<&Vec<f32>> {
        self.entries.get(&(content_hash.to_string(), embedder_id.to_string()))
    }

    pub fn get_many(&self, embedder_id: &str, hashes: &[String]) -> HashMap<String, Vec<f32>> {
        hashes.iter().filter_map(|h| self.get(embedder_id, h).map(|v| (h.clone(), v.clone()))).collect()
    }

    pub fn put_many(&mut self, entries: impl IntoIterator<Item = CacheEntry>) {
        for e in entries {
            self.entries.insert((e.content_hash, e.embedder_id), e.vector);
            self.dirty = true;
        }
    }

    /// Write the cache back to its file, if it has one and changed.
    pub fn flush(&mut self) -> Result<()> {
        let Some(path) = &self.path else { return Ok(()) };
        if !self.dirty { return Ok(()); }
        let entries: Vec<CacheEntry> = self
            .entries
            .iter()
            .map(|((content_hash, embedder_id), vector)| CacheEntry { content_hash: content_hash.clone(), embedder_id: embedder_id.clone(), vector: vector.clone() })
            .collect();
        if let Some(parent) = path.parent() { std::fs::create_dir_all(parent)?; }
        std::fs::write(path, serde_json::to_vec(&entries)?).with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), count = entries.len(), "embedding cache flushed");
        self.dirty = false;
        Ok(())
    }
}
