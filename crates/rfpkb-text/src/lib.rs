//! rfpkb-text
//!
//! Tantivy-based lexical ranking. A `LexicalIndex` is built in RAM over one
//! tenant corpus per request and queried once per sub-query, so BM25
//! statistics (IDF, average length) are shared by every sub-query.

pub mod tantivy_utils;
pub mod index;

pub use index::LexicalIndex;
