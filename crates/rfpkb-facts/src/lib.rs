//! rfpkb-facts
//!
//! Keeps a tenant's attribute store consistent as documents are ingested:
//! the conflict resolver decides what each extracted fact does to the
//! store, and the writer applies that decision atomically.

pub mod prompts;
pub mod resolver;
pub mod memory;
pub mod sqlite;
pub mod writer;

pub use memory::MemoryFactStore;
pub use resolver::{ConflictResolver, ResolutionReport, ResolutionStats};
pub use sqlite::SqliteFactStore;
pub use writer::{KnowledgeWriter, ResyncSummary};
