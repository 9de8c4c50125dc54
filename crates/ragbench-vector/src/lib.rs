//! Dense-vector side: similarity functions, an exact flat index and batched
//! document embedding with a content-hash cache.

pub mod backfill;
pub mod cache;
pub mod flat;
pub mod similarity;

pub use backfill::DocumentEmbedder;
pub use cache::{CacheEntry, EmbeddingCache};
pub use flat::FlatIndex;
pub use similarity::Similarity;
