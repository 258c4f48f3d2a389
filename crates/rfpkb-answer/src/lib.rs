//! rfpkb-answer
//!
//! Turns one RFP question into an `AnswerEnvelope`: attribute shortcut,
//! hybrid retrieval, generation and trust scoring, wired around injected
//! service handles.

pub mod pipeline;
pub mod prompts;
pub mod remote;
pub mod shortcut;
pub mod trust;

pub use pipeline::{KnowledgeEngine, Outcome, PipelineState, Services};
pub use remote::{ChatModel, HttpReranker};
pub use shortcut::AttributeMatch;
pub use trust::{TrustBreakdown, TrustInputs, TrustScorer};
