use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

use ragbench_core::traits::TextIndexer;
use ragbench_core::types::{Document, SearchHit, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer};

const WRITER_BUDGET: usize = 50_000_000;

/// In-memory BM25 index keyed by document id.
///
/// Re-indexing an id replaces its previous text.
pub struct LexicalIndex {
	index: Index,
	reader: IndexReader,
	id_field: Field,
	text_field: Field,
}

impl LexicalIndex {
	pub fn new() -> Result<Self> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let id_field = schema.get_field("id")?;
		let text_field = schema.get_field("text")?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self { index, reader, id_field, text_field })
	}

	pub fn num_docs(&self) -> u64 { self.reader.searcher().num_docs() }

	/// Run `text` through the field analyzer; the resulting terms form the query.
	pub fn analyze(&self, text: &str) -> Result<Vec<String>> {
		let mut analyzer = self.index.tokenizer_for_field(self.text_field)?;
		let mut terms = Vec::new();
		analyzer.token_stream(text).process(&mut |tok| {
			if !terms.contains(&tok.text) { terms.push(tok.text.clone()); }
		});
		Ok(terms)
	}
}

impl TextIndexer for LexicalIndex {
	fn index(&mut self, docs: &[Document]) -> anyhow::Result<()> {
		let mut index_writer = self.index.writer_with_num_threads(1, WRITER_BUDGET)?;
		for d in docs {
			index_writer.delete_term(Term::from_field_text(self.id_field, &d.id));
			index_writer.add_document(doc!(
				self.id_field => d.id.clone(),
				self.text_field => d.content.clone(),
			))?;
		}
		index_writer.commit()?;
		self.reader.reload()?;
		debug!(count = docs.len(), "lexical index updated");
		Ok(())
	}

	fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<SearchHit>> {
		let terms = self.analyze(query)?;
		if terms.is_empty() || k == 0 { return Ok(Vec::new()); }
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let term = Term::from_field_text(self.text_field, t);
				(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
			})
			.collect();
		let q = BooleanQuery::new(clauses);
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&q, &TopDocs::with_limit(k))?;
		let mut hits = Vec::new();
		for (score, addr) in top_docs {
			if score <= 0.0 { continue; }
			let doc: TantivyDocument = searcher.doc(addr)?;
			let id = doc.get_first(self.id_field).and_then(|v| v.as_str()).unwrap_or("").to_string();
			hits.push(SearchHit { id, score: f64::from(score), source: SourceKind::Text });
		}
		Ok(hits)
	}
}
