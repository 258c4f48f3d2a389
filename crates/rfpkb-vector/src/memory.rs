use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use rfpkb_core::error::{Error, Result};
use rfpkb_core::traits::ChunkStore;
use rfpkb_core::types::{Chunk, TenantId};

/// Process-local chunk store with the same replace-on-reingest semantics as
/// the LanceDB store.
#[derive(Default)]
pub struct MemoryChunkStore {
    chunks: RwLock<HashMap<TenantId, Vec<Chunk>>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn insert_chunks(&self, tenant: &TenantId, chunks: &[Chunk]) -> Result<usize> {
        if let Some(foreign) = chunks.iter().find(|c| &c.tenant_id != tenant) {
            return Err(Error::Operation(format!("chunk {} belongs to tenant {}, not {}", foreign.id, foreign.tenant_id, tenant)));
        }
        let mut guard = self.chunks.write().await;
        let rows = guard.entry(tenant.clone()).or_default();
        rows.retain(|existing| !chunks.iter().any(|c| c.document_id == existing.document_id));
        rows.extend(chunks.iter().cloned());
        Ok(chunks.len())
    }

    async fn load_corpus(&self, tenant: &TenantId) -> Result<Vec<Chunk>> {
        let mut out = self.chunks.read().await.get(tenant).cloned().unwrap_or_default();
        out.sort_by(|a, b| a.document_id.cmp(&b.document_id).then(a.chunk_index.cmp(&b.chunk_index)));
        Ok(out)
    }

    async fn delete_document(&self, tenant: &TenantId, document_id: &str) -> Result<usize> {
        let mut guard = self.chunks.write().await;
        let Some(rows) = guard.get_mut(tenant) else { return Ok(0) };
        let before = rows.len();
        rows.retain(|c| c.document_id != document_id);
        Ok(before - rows.len())
    }
}
