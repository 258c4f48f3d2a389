use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use rfpkb_core::error::{Error, Result};
use rfpkb_core::types::Chunk;
use rfpkb_text::LexicalIndex;

/// A tenant's chunks plus the lexical index built over them, shared
/// read-only by every sub-query of one request.
pub struct Corpus {
    chunks: Vec<Arc<Chunk>>,
    positions: HashMap<String, usize>,
    lexical: LexicalIndex,
}

impl Corpus {
    pub fn build(chunks: Vec<Chunk>) -> Result<Self> {
        let lexical = LexicalIndex::build(chunks.iter().map(|c| (c.id.as_str(), c.text.as_str()))).map_err(Error::Lexical)?;
        let chunks: Vec<Arc<Chunk>> = chunks.into_iter().map(Arc::new).collect();
        let positions = chunks.iter().enumerate().map(|(i, c)| (c.id.clone(), i)).collect();
        debug!(chunks = chunks.len(), "built corpus");
        Ok(Self { chunks, positions, lexical })
    }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn get(&self, id: &str) -> Option<&Arc<Chunk>> {
        self.positions.get(id).map(|&i| &self.chunks[i])
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] { &self.chunks }

    pub fn lexical(&self) -> &LexicalIndex { &self.lexical }
}
