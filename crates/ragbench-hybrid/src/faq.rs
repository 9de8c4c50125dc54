use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use ragbench_core::error::{Error, Result};
use ragbench_core::ports::Ports;
use ragbench_core::traits::Stage;
use ragbench_core::types::{Document, DocumentId, ParentRef};
use ragbench_vector::{DocumentEmbedder, Similarity};

use crate::parent::{DocumentDeduplicator, ParentDocumentRetriever};
use crate::store::DocumentStore;

/// Question -> closest canonical FAQ entries -> their source documents.
///
/// FAQ entries carry their canonical question as `content` and the parent
/// URLs in `meta.sources`.
pub struct FaqRetriever {
    embedder: Arc<DocumentEmbedder>,
    faq_store: DocumentStore,
    parents: ParentDocumentRetriever,
    dedup: DocumentDeduplicator,
    top_k: usize,
    scale_score: bool,
}

impl FaqRetriever {
    /// Resolve sources to parent ids, embed the resolvable entries and index
    /// them. Entries with any unresolved source are skipped with a warning.
    pub fn build(corpus: Arc<DocumentStore>, faqs: Vec<Document>, embedder: Arc<DocumentEmbedder>, similarity: Similarity) -> Result<Self> {
        let url_to_id: HashMap<&str, &DocumentId> = corpus.documents().filter_map(|d| d.url().map(|u| (u, &d.id))).collect();

        let mut resolved = Vec::with_capacity(faqs.len());
        for faq in faqs {
            match resolve_sources(&faq, &url_to_id) {
                Ok(parent_ids) => {
                    let mut faq = faq;
                    faq.meta.parent_ids = Some(ParentRef::from(parent_ids));
                    resolved.push(faq);
                }
                Err(e) => warn!(faq = %faq.id, error = %e, "skipping faq entry"),
            }
        }

        embedder.embed_documents(&mut resolved)?;
        let mut faq_store = DocumentStore::new(similarity)?;
        let indexed = faq_store.write(resolved)?;
        info!(indexed, "faq index built");

        Ok(Self { embedder, faq_store, parents: ParentDocumentRetriever::new(corpus), dedup: DocumentDeduplicator, top_k: 1, scale_score: false })
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self { self.top_k = top_k; self }
    pub fn with_scale_score(mut self, scale_score: bool) -> Self { self.scale_score = scale_score; self }

    /// Number of FAQ entries that made it into the index.
    pub fn indexed(&self) -> usize { self.faq_store.count() }

    pub fn retrieve(&self, question: &str, top_k: Option<usize>) -> Result<Vec<Document>> {
        let query_embedding = self.embedder.embed_query(question)?;
        let matches = self.faq_store.vector_search(&query_embedding, top_k.unwrap_or(self.top_k), None, self.scale_score)?;
        Ok(self.dedup.run(self.parents.retrieve(&matches)))
    }
}

fn resolve_sources(faq: &Document, url_to_id: &HashMap<&str, &DocumentId>) -> Result<Vec<DocumentId>> {
    faq.meta
        .sources
        .iter()
        .map(|url| {
            url_to_id
                .get(url.as_str())
                .map(|id| (*id).clone())
                .ok_or_else(|| Error::UnresolvedReference(format!("source {url} has no document in the corpus")))
        })
        .collect()
}

impl Stage for FaqRetriever {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let question = inputs.require_text("text")?;
        let top_k = inputs.take_count("top_k")?;
        Ok(Ports::new().with("documents", self.retrieve(&question, top_k)?))
    }
}
