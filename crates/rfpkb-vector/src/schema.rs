use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Chunk table layout. `vector` is null for chunks not yet embedded;
/// `metadata` holds the chunk's facets as a JSON object.
pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("tenant_id", DataType::Utf8, false),
		Field::new("document_id", DataType::Utf8, false),
		Field::new("chunk_index", DataType::Int32, false),
		Field::new("text", DataType::Utf8, false),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// SQL string literal with single quotes doubled.
pub fn quote(value: &str) -> String {
	format!("'{}'", value.replace('\'', "''"))
}
