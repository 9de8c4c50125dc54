//! Pipeline graph, post-retrieval stages, generation and the experiment loop.

pub mod builder;
pub mod experiment;
pub mod generation;
pub mod graph;
pub mod hyde;
pub mod links;
pub mod openai;
pub mod prompt;
pub mod rerank;

pub use builder::{Backends, QueryOutcome, RagPipeline};
pub use generation::MultiSampleGenerator;
pub use graph::{Connection, Pipeline, PipelineDescription};
pub use hyde::Hyde;
pub use links::{clean_unlinked_references, ContentLinkNormalizer};
pub use openai::OpenAiChatGenerator;
pub use prompt::PromptBuilder;
pub use rerank::{RandomReranker, RerankerKind, ScoreOrderReranker, SimilarityReranker};
