//! Domain types shared by the resolver, retriever and answer pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;

pub type ChunkId = String;
pub type AttributeId = String;
pub type Meta = BTreeMap<String, String>;

/// Identity of the organisation whose documents and attributes are scoped
/// together. Never empty: every read and write is filtered by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self, Error> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(Error::MissingTenant);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fragment of extracted document text, independently retrievable.
///
/// - `id`: `"{document_id}:{chunk_index}"`, unique within a tenant
/// - `embedding`: absent until the embedding service has produced one; such a
///   chunk is skipped by vector scoring but still ranked lexically
/// - `metadata`: free-form string facets (e.g. `char_count`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub tenant_id: TenantId,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Meta,
}

/// A stored `(key, value, category)` fact about a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub tenant_id: TenantId,
    pub key: String,
    pub value: String,
    pub category: String,
    pub source_document_id: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// A freshly extracted fact, not yet reconciled with the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttribute {
    pub key: String,
    pub value: String,
    pub category: String,
    #[serde(default)]
    pub source_document_id: Option<String>,
}

/// Indicates which signal produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Lexical,
}

/// The minimal surface returned by both rankers.
///
/// `id` matches `Chunk::id`. `score` is signal-specific but higher is always
/// better: cosine similarity for vectors, raw BM25 for lexical hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
}

/// Per-request retrieval candidate. Signals a chunk did not receive are 0.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk: Arc<Chunk>,
    pub vector_score: f32,
    pub lexical_score: f32,
    pub hybrid_score: f32,
    pub rerank_score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Duplicate,
    Update,
    Similar,
    Ambiguous,
}

/// An accepted match between a new attribute and an existing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub new_attribute: NewAttribute,
    pub existing_attribute: Attribute,
    pub key_similarity: f32,
    pub value_similarity: f32,
    pub category_match: bool,
    /// Weighted match score that cleared the acceptance threshold.
    pub similarity: f32,
    pub conflict_type: ConflictType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    KeepExisting,
    KeepNew,
    MergeBoth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Rule,
    ExternalJudgment,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub conflict: Conflict,
    pub decision: Decision,
    pub reason: String,
    pub merged_value: Option<String>,
    pub method: ResolutionMethod,
}

/// In-place update of one stored attribute, guarded by the `last_updated`
/// observed when the batch was resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeUpdate {
    pub id: AttributeId,
    pub observed_last_updated: DateTime<Utc>,
    pub value: String,
    pub source_document_id: Option<String>,
}

/// Everything one ingestion batch writes. Applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WritePlan {
    pub updates: Vec<AttributeUpdate>,
    pub inserts: Vec<NewAttribute>,
    /// Tenant version of the snapshot the plan was resolved against. When
    /// set, the plan only applies if no other write landed since.
    pub base_version: Option<u64>,
}

impl WritePlan {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.inserts.is_empty()
    }
}

/// A tenant's attributes together with the version they were read at.
/// Every successful write to the tenant bumps the version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub attributes: Vec<Attribute>,
    pub version: u64,
}

/// One entry of a reranker response: position in the submitted document
/// list plus its relevance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankHit {
    pub index: usize,
    pub relevance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Attribute,
    Rag,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    Attribute {
        key: String,
        value: String,
        category: String,
        similarity: f32,
    },
    Chunk {
        chunk_id: ChunkId,
        document_id: String,
        text: String,
        rerank_score: f32,
    },
}

/// Final answer for one question. `trust_score` is always within [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEnvelope {
    pub answer_text: String,
    pub trust_score: f32,
    pub source_type: SourceType,
    pub sources: Vec<Source>,
}
