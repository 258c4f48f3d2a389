use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use rfpkb_core::error::{Error, Result};
use rfpkb_core::traits::ChunkStore;
use rfpkb_core::types::{Chunk, Meta, TenantId};

use crate::schema::{build_chunk_schema, quote};
use crate::table::{ensure_table, open_db};

const INSERT_BATCH: usize = 1000;

/// All tenants share one table; every read, write and delete is filtered by
/// `tenant_id`.
pub struct LanceChunkStore {
	db: Connection,
	table_name: String,
	dim: usize,
}

impl LanceChunkStore {
	pub async fn open(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
		let db = open_db(db_path.to_string_lossy().as_ref()).await.map_err(Error::persistence)?;
		ensure_table(&db, table_name, build_chunk_schema(dim as i32)).await.map_err(Error::persistence)?;
		info!(path = %db_path.display(), table = table_name, dim, "opened chunk store");
		Ok(Self { db, table_name: table_name.to_string(), dim })
	}

	async fn table(&self) -> Result<Table> {
		self.db.open_table(&self.table_name).execute().await.map_err(Error::persistence)
	}

	fn chunks_to_record_batch(&self, chunks: &[Chunk]) -> Result<RecordBatch> {
		let mut ids = Vec::with_capacity(chunks.len());
		let mut tenants = Vec::with_capacity(chunks.len());
		let mut documents = Vec::with_capacity(chunks.len());
		let mut indices = Vec::with_capacity(chunks.len());
		let mut texts = Vec::with_capacity(chunks.len());
		let mut metadata = Vec::with_capacity(chunks.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
		for chunk in chunks {
			if let Some(v) = &chunk.embedding {
				if v.len() != self.dim {
					return Err(Error::Operation(format!("chunk {} has a {}-dimensional embedding, table expects {}", chunk.id, v.len(), self.dim)));
				}
			}
			ids.push(chunk.id.clone());
			tenants.push(chunk.tenant_id.as_str().to_string());
			documents.push(chunk.document_id.clone());
			indices.push(chunk.chunk_index as i32);
			texts.push(chunk.text.clone());
			metadata.push(serde_json::to_string(&chunk.metadata).map_err(Error::persistence)?);
			vectors.push(chunk.embedding.as_ref().map(|v| v.iter().map(|&x| Some(x)).collect()));
		}
		RecordBatch::try_new(build_chunk_schema(self.dim as i32), vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(tenants)),
			Arc::new(StringArray::from(documents)),
			Arc::new(Int32Array::from(indices)),
			Arc::new(StringArray::from(texts)),
			Arc::new(StringArray::from(metadata)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), self.dim as i32)),
		])
		.map_err(Error::persistence)
	}
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| Error::persistence(anyhow::anyhow!("chunks.{} column missing", name)))
}

fn decode_batch(tenant: &TenantId, batch: &RecordBatch, out: &mut Vec<Chunk>) -> Result<()> {
	let ids = string_column(batch, "id")?;
	let documents = string_column(batch, "document_id")?;
	let texts = string_column(batch, "text")?;
	let metadata = string_column(batch, "metadata")?;
	let indices = batch
		.column_by_name("chunk_index")
		.and_then(|c| c.as_any().downcast_ref::<Int32Array>())
		.ok_or_else(|| Error::persistence(anyhow::anyhow!("chunks.chunk_index column missing")))?;
	let vectors = batch
		.column_by_name("vector")
		.and_then(|c| c.as_fixed_size_list_opt())
		.ok_or_else(|| Error::persistence(anyhow::anyhow!("chunks.vector column missing")))?;
	for i in 0..batch.num_rows() {
		let embedding = if vectors.is_null(i) {
			None
		} else {
			Some(vectors.value(i).as_primitive::<Float32Type>().values().to_vec())
		};
		let meta: Meta = serde_json::from_str(metadata.value(i)).unwrap_or_default();
		out.push(Chunk {
			id: ids.value(i).to_string(),
			tenant_id: tenant.clone(),
			document_id: documents.value(i).to_string(),
			chunk_index: indices.value(i).max(0) as usize,
			text: texts.value(i).to_string(),
			embedding,
			metadata: meta,
		});
	}
	Ok(())
}

#[async_trait]
impl ChunkStore for LanceChunkStore {
	/// Re-ingesting a document replaces its previous chunks.
	async fn insert_chunks(&self, tenant: &TenantId, chunks: &[Chunk]) -> Result<usize> {
		if chunks.is_empty() { return Ok(0); }
		if let Some(foreign) = chunks.iter().find(|c| &c.tenant_id != tenant) {
			return Err(Error::Operation(format!("chunk {} belongs to tenant {}, not {}", foreign.id, foreign.tenant_id, tenant)));
		}
		let table = self.table().await?;
		let documents: BTreeSet<&str> = chunks.iter().map(|c| c.document_id.as_str()).collect();
		for document_id in documents {
			let predicate = format!("tenant_id = {} AND document_id = {}", quote(tenant.as_str()), quote(document_id));
			table.delete(&predicate).await.map_err(Error::persistence)?;
		}
		for batch in chunks.chunks(INSERT_BATCH) {
			let record_batch = self.chunks_to_record_batch(batch)?;
			let schema = record_batch.schema();
			let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
			table.add(reader).execute().await.map_err(Error::persistence)?;
		}
		debug!(tenant = %tenant, chunks = chunks.len(), "inserted chunks");
		Ok(chunks.len())
	}

	/// Ordered by `(document_id, chunk_index)`.
	async fn load_corpus(&self, tenant: &TenantId) -> Result<Vec<Chunk>> {
		let table = self.table().await?;
		let mut stream = table
			.query()
			.only_if(format!("tenant_id = {}", quote(tenant.as_str())))
			.execute()
			.await
			.map_err(Error::persistence)?;
		let mut out = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(Error::persistence)? {
			decode_batch(tenant, &batch, &mut out)?;
		}
		out.sort_by(|a, b| a.document_id.cmp(&b.document_id).then(a.chunk_index.cmp(&b.chunk_index)));
		debug!(tenant = %tenant, chunks = out.len(), "loaded corpus");
		Ok(out)
	}

	async fn delete_document(&self, tenant: &TenantId, document_id: &str) -> Result<usize> {
		let table = self.table().await?;
		let predicate = format!("tenant_id = {} AND document_id = {}", quote(tenant.as_str()), quote(document_id));
		let count = table.count_rows(Some(predicate.clone())).await.map_err(Error::persistence)?;
		if count > 0 {
			table.delete(&predicate).await.map_err(Error::persistence)?;
		}
		info!(tenant = %tenant, document_id, removed = count, "deleted document chunks");
		Ok(count)
	}
}
