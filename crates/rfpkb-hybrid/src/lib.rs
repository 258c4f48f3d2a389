//! Hybrid retrieval over one tenant's chunks.
//!
//! A question fans out into sub-queries; each is scored by embedding cosine
//! and by BM25, the union is fused, optionally reranked, deduplicated and
//! packed into a token budget.

pub mod corpus;
pub mod decompose;
pub mod fusion;
pub mod pack;
pub mod rerank;
pub mod retriever;

pub use corpus::Corpus;
pub use decompose::decompose;
pub use retriever::{HybridRetriever, Retrieval};
