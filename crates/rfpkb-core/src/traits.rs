//! Narrow contracts for the engine's external collaborators.
//!
//! Remote services answer with `anyhow::Result` and are allowed to fail: the
//! caller decides whether a failure degrades or aborts. Stores answer with
//! the crate `Result` so persistence failures stay distinguishable.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Attribute, Chunk, RerankHit, Snapshot, TenantId, WritePlan};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimensionality shared by query and chunk vectors.
    fn dim(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Relevance of each document to `query`, most relevant first.
    async fn rerank(&self, query: &str, documents: &[String]) -> anyhow::Result<Vec<RerankHit>>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Structured judgment: returns the raw (JSON) text of the model's decision.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, system: &str, prompt: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn insert_chunks(&self, tenant: &TenantId, chunks: &[Chunk]) -> Result<usize>;
    async fn load_corpus(&self, tenant: &TenantId) -> Result<Vec<Chunk>>;
    async fn delete_document(&self, tenant: &TenantId, document_id: &str) -> Result<usize>;
}

#[async_trait]
pub trait AttributeStore: Send + Sync {
    /// Attributes and tenant version, read consistently.
    async fn snapshot(&self, tenant: &TenantId) -> Result<Snapshot>;

    async fn load(&self, tenant: &TenantId) -> Result<Vec<Attribute>> {
        Ok(self.snapshot(tenant).await?.attributes)
    }

    /// Apply a whole plan atomically and bump the tenant version. A stale
    /// `base_version` or a guard miss on any update yields
    /// `Error::StaleWrite` and leaves the store untouched.
    async fn apply(&self, tenant: &TenantId, plan: &WritePlan) -> Result<()>;
    async fn clear(&self, tenant: &TenantId) -> Result<usize>;
}

/// The JSON body of a judge response, with any surrounding markdown code
/// fence removed.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else { return trimmed };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
