use indexmap::IndexMap;
use tracing::debug;

use ragbench_core::error::{Error, Result};
use ragbench_core::filter::Filter;
use ragbench_core::traits::{TextIndexer, VectorIndexer};
use ragbench_core::types::{Document, DocumentId, SearchHit};
use ragbench_text::{scale_bm25, LexicalIndex};
use ragbench_vector::{FlatIndex, Similarity};

/// Documents keyed by id, with a lexical and a vector index kept in step.
///
/// Iteration order is insertion order; overwriting an id keeps its slot.
/// Every query returns copies, so callers never see each other's scores.
pub struct DocumentStore {
    docs: IndexMap<DocumentId, Document>,
    text: Box<dyn TextIndexer>,
    vectors: Box<dyn VectorIndexer>,
    similarity: Similarity,
    dim: Option<usize>,
}

impl DocumentStore {
    pub fn new(similarity: Similarity) -> Result<Self> {
        Ok(Self::with_indexers(Box::new(LexicalIndex::new()?), Box::new(FlatIndex::new(similarity)), similarity))
    }

    pub fn with_indexers(text: Box<dyn TextIndexer>, vectors: Box<dyn VectorIndexer>, similarity: Similarity) -> Self {
        Self { docs: IndexMap::new(), text, vectors, similarity, dim: None }
    }

    pub fn similarity(&self) -> Similarity { self.similarity }

    pub fn count(&self) -> usize { self.docs.len() }

    pub fn get(&self, id: &str) -> Option<&Document> { self.docs.get(id) }

    pub fn get_index(&self, position: usize) -> Option<&Document> { self.docs.get_index(position).map(|(_, d)| d) }

    pub fn documents(&self) -> impl Iterator<Item = &Document> { self.docs.values() }

    /// Insert or overwrite by id. Returns the number of documents written.
    pub fn write(&mut self, documents: Vec<Document>) -> Result<usize> {
        let mut dim = self.dim;
        for d in &documents {
            if let Some(embedding) = &d.embedding {
                match dim {
                    Some(expected) if expected != embedding.len() => return Err(Error::DimensionMismatch { expected, actual: embedding.len() }),
                    Some(_) => {}
                    None => dim = Some(embedding.len()),
                }
            }
        }
        self.text.index(&documents)?;
        self.vectors.index(&documents)?;
        self.dim = dim;
        let written = documents.len();
        for d in documents { self.docs.insert(d.id.clone(), d); }
        debug!(written, total = self.docs.len(), "store write");
        Ok(written)
    }

    /// All matching documents in store order; an absent or empty filter matches nothing.
    pub fn filter(&self, filter: Option<&Filter>) -> Vec<Document> {
        match filter {
            Some(f) if !f.is_empty() => self.docs.values().filter(|d| f.matches(d)).cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// BM25 over `content`. Non-matching documents are never returned; an
    /// empty filter here means no restriction.
    pub fn lexical_search(&self, query: &str, top_k: usize, filter: Option<&Filter>, scale_score: bool) -> Result<Vec<Document>> {
        if top_k == 0 || self.docs.is_empty() { return Ok(Vec::new()); }
        let hits = self.text.search(query, self.docs.len())?;
        Ok(self.rank(hits, top_k, filter, |s| if scale_score { scale_bm25(s) } else { s }))
    }

    pub fn vector_search(&self, query_vector: &[f32], top_k: usize, filter: Option<&Filter>, scale_score: bool) -> Result<Vec<Document>> {
        if let Some(dim) = self.dim {
            if dim != query_vector.len() { return Err(Error::DimensionMismatch { expected: dim, actual: query_vector.len() }); }
        }
        if top_k == 0 || self.docs.is_empty() { return Ok(Vec::new()); }
        let hits = self.vectors.search_vec(query_vector, self.docs.len())?;
        let similarity = self.similarity;
        Ok(self.rank(hits, top_k, filter, |s| if scale_score { similarity.scale(s) } else { s }))
    }

    fn rank(&self, hits: Vec<SearchHit>, top_k: usize, filter: Option<&Filter>, scale: impl Fn(f64) -> f64) -> Vec<Document> {
        let restrict = filter.filter(|f| !f.is_empty());
        let mut ranked: Vec<(usize, f64, &Document)> = hits
            .into_iter()
            .filter_map(|h| self.docs.get_full(&h.id).map(|(pos, _, doc)| (pos, h.score, doc)))
            .filter(|(_, _, doc)| restrict.map_or(true, |f| f.matches(doc)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.into_iter().take(top_k).map(|(_, score, doc)| doc.scored(scale(score))).collect()
    }
}
