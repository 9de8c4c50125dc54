pub mod tantivy_utils;
pub mod index;

pub use index::LexicalIndex;
pub use tantivy_utils::scale_bm25;
