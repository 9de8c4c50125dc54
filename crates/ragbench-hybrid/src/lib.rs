//! Document store and the retrieval-side stages: lexical and oracle
//! strategies, embedding retrieval, rank fusion, parent expansion and the
//! FAQ sub-pipeline.

pub mod dense;
pub mod faq;
pub mod joiner;
pub mod parent;
pub mod retriever;
pub mod store;

pub use dense::{EmbeddingRetriever, TextEmbedderStage};
pub use faq::FaqRetriever;
pub use joiner::{DocumentJoiner, JoinMode};
pub use parent::{DocumentDeduplicator, ParentDocumentRetriever};
pub use retriever::{LexicalRetriever, RetrievalMode};
pub use store::DocumentStore;
