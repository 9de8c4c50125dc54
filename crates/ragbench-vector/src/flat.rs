use anyhow::{bail, Result};
use std::collections::HashMap;
use tracing::debug;

use ragbench_core::traits::VectorIndexer;
use ragbench_core::types::{Document, DocumentId, SearchHit, SourceKind};

use crate::similarity::Similarity;

/// Exact nearest-neighbour search over every stored embedding.
///
/// Hits come back best first with raw similarity scores; equal scores keep
/// insertion order. Documents without an embedding are not indexed, and
/// re-indexing an id without one drops its old vector.
pub struct FlatIndex {
    similarity: Similarity,
    ids: Vec<DocumentId>,
    positions: HashMap<DocumentId, usize>,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(similarity: Similarity) -> Self { Self { similarity, ids: Vec::new(), positions: HashMap::new(), vectors: Vec::new() } }

    pub fn similarity(&self) -> Similarity { self.similarity }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    pub fn dim(&self) -> Option<usize> { self.vectors.first().map(Vec::len) }

    /// Drop the vector stored for `id`, if any. Later entries keep their order.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(pos) = self.positions.remove(id) else { return false };
        self.ids.remove(pos);
        self.vectors.remove(pos);
        for later in &self.ids[pos..] {
            if let Some(p) = self.positions.get_mut(later) { *p -= 1; }
        }
        true
    }
}

impl VectorIndexer for FlatIndex {
    fn index(&mut self, docs: &[Document]) -> Result<()> {
        let mut added = 0usize;
        for d in docs {
            let Some(embedding) = &d.embedding else {
                self.remove(&d.id);
                continue;
            };
            if let Some(dim) = self.dim() {
                if embedding.len() != dim { bail!("document {} has {} dims, index has {}", d.id, embedding.len(), dim); }
            }
            match self.positions.get(&d.id) {
                Some(&pos) => self.vectors[pos] = embedding.clone(),
                None => {
                    self.positions.insert(d.id.clone(), self.ids.len());
                    self.ids.push(d.id.clone());
                    self.vectors.push(embedding.clone());
                }
            }
            added += 1;
        }
        debug!(count = added, "vector index updated");
        Ok(())
    }

    fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if let Some(dim) = self.dim() {
            if query_vec.len() != dim { bail!("query has {} dims, index has {}", query_vec.len(), dim); }
        }
        let mut scored: Vec<(usize, f64)> = self.vectors.iter().enumerate().map(|(i, v)| (i, self.similarity.score(query_vec, v))).collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(scored.into_iter().take(k).map(|(i, score)| SearchHit { id: self.ids[i].clone(), score, source: SourceKind::Vector }).collect())
    }
}
