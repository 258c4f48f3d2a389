use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, TantivyDocument};
use tracing::debug;

use rfpkb_core::types::{SearchHit, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer};

const WRITER_MEMORY_BYTES: usize = 20_000_000;

/// In-RAM BM25 index over one corpus (k1 = 1.2, b = 0.75).
pub struct LexicalIndex {
	index: Index,
	reader: IndexReader,
	id_field: Field,
	text_field: Field,
	len: usize,
}

impl LexicalIndex {
	/// Index `(id, text)` pairs. The corpus is immutable afterwards.
	pub fn build<'a, I>(docs: I) -> Result<Self>
	where
		I: IntoIterator<Item = (&'a str, &'a str)>,
	{
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let id_field = schema.get_field("id")?;
		let text_field = schema.get_field("text")?;

		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
		let mut len = 0usize;
		for (id, text) in docs {
			writer.add_document(doc!(id_field => id, text_field => text))?;
			len += 1;
		}
		writer.commit()?;
		let reader = index.reader()?;
		debug!(docs = len, "built lexical index");
		Ok(Self { index, reader, id_field, text_field, len })
	}

	pub fn len(&self) -> usize { self.len }

	pub fn is_empty(&self) -> bool { self.len == 0 }

	/// Top `limit` documents by BM25 for free-text `query`. Syntax the query
	/// parser rejects is ignored rather than failing the request; documents
	/// sharing no term with the query are absent (their score is 0).
	pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
		if limit == 0 || self.is_empty() { return Ok(vec![]); }
		let searcher = self.reader.searcher();
		let parser = QueryParser::for_index(&self.index, vec![self.text_field]);
		let (parsed, errors) = parser.parse_query_lenient(query);
		if !errors.is_empty() { debug!(query, errors = errors.len(), "lenient query parse dropped clauses"); }
		let top_docs = searcher.search(&parsed, &TopDocs::with_limit(limit))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let id = doc.get_first(self.id_field).and_then(|v| v.as_str()).unwrap_or("").to_string();
			hits.push(SearchHit { id, score, source: SourceKind::Lexical });
		}
		Ok(hits)
	}
}
