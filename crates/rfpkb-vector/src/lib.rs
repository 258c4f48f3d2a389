//! Chunk persistence.
//!
//! `LanceChunkStore` keeps every tenant's chunks in one LanceDB table with a
//! nullable vector column; `MemoryChunkStore` is the in-process equivalent.

pub mod schema;
pub mod table;
pub mod store;
pub mod memory;

pub use memory::MemoryChunkStore;
pub use store::LanceChunkStore;
