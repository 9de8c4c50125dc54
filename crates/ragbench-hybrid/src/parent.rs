use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use ragbench_core::error::Result;
use ragbench_core::ports::Ports;
use ragbench_core::traits::Stage;
use ragbench_core::types::Document;

use crate::store::DocumentStore;

/// Expands child matches (FAQ entries, chunks) to the parents named in their
/// `parent_id`, carrying the child's score.
pub struct ParentDocumentRetriever {
    corpus: Arc<DocumentStore>,
}

impl ParentDocumentRetriever {
    pub fn new(corpus: Arc<DocumentStore>) -> Self { Self { corpus } }

    /// Children in input order, parents in listed order. Unknown parent ids
    /// are skipped.
    pub fn retrieve(&self, children: &[Document]) -> Vec<Document> {
        let mut out = Vec::new();
        for child in children {
            let Some(parents) = &child.meta.parent_ids else { continue };
            for parent_id in parents.ids() {
                match self.corpus.get(parent_id) {
                    Some(parent) => {
                        let mut copy = parent.clone();
                        copy.score = child.score;
                        out.push(copy);
                    }
                    None => debug!(child = %child.id, parent = %parent_id, "parent not in corpus, skipped"),
                }
            }
        }
        out
    }
}

impl Stage for ParentDocumentRetriever {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let children = inputs.take_documents("documents")?.unwrap_or_default();
        Ok(Ports::new().with("documents", self.retrieve(&children)))
    }
}

/// Keeps the first occurrence of every id.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentDeduplicator;

impl DocumentDeduplicator {
    pub fn run(&self, documents: Vec<Document>) -> Vec<Document> {
        let mut seen = HashSet::new();
        documents.into_iter().filter(|d| seen.insert(d.id.clone())).collect()
    }
}

impl Stage for DocumentDeduplicator {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let docs = inputs.take_documents("documents")?.unwrap_or_default();
        Ok(Ports::new().with("documents", DocumentDeduplicator::run(self, docs)))
    }
}
