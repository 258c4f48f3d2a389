use std::cmp::Ordering;
use std::collections::HashMap;

use rfpkb_core::config::RetrievalSettings;
use rfpkb_core::similarity::cosine_similarity;
use rfpkb_core::types::{Candidate, SearchHit, SourceKind};

use crate::corpus::Corpus;

/// Top `limit` chunks by cosine similarity. Chunks without an embedding are
/// not scored.
pub fn vector_hits(query: &[f32], corpus: &Corpus, limit: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = corpus
        .chunks()
        .iter()
        .filter_map(|chunk| {
            let embedding = chunk.embedding.as_ref()?;
            Some(SearchHit { id: chunk.id.clone(), score: cosine_similarity(query, embedding), source: SourceKind::Vector })
        })
        .collect();
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits.truncate(limit);
    hits
}

pub fn by_score_desc(a: f32, b: f32) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Union hits by chunk id, keeping the best score seen per signal, then
/// rank by `vector_weight·v + lexical_weight·(l / lexical_scale)`.
/// A missing signal counts as 0; ties keep first-seen order.
pub fn fuse<I>(hits: I, corpus: &Corpus, settings: &RetrievalSettings) -> Vec<Candidate>
where
    I: IntoIterator<Item = SearchHit>,
{
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, (Option<f32>, Option<f32>)> = HashMap::new();
    for hit in hits {
        let entry = best.entry(hit.id.clone()).or_insert_with(|| {
            order.push(hit.id.clone());
            (None, None)
        });
        let slot = match hit.source {
            SourceKind::Vector => &mut entry.0,
            SourceKind::Lexical => &mut entry.1,
        };
        *slot = Some(slot.map_or(hit.score, |s| s.max(hit.score)));
    }

    let mut fused: Vec<Candidate> = order
        .into_iter()
        .filter_map(|id| {
            let (vector, lexical) = best.get(&id).copied()?;
            let chunk = corpus.get(&id)?.clone();
            let vector_score = vector.unwrap_or(0.0);
            let lexical_score = lexical.unwrap_or(0.0);
            let hybrid_score = settings.vector_weight * vector_score + settings.lexical_weight * (lexical_score / settings.lexical_scale);
            Some(Candidate { chunk, vector_score, lexical_score, hybrid_score, rerank_score: hybrid_score })
        })
        .collect();
    fused.sort_by(|a, b| by_score_desc(a.hybrid_score, b.hybrid_score));
    fused.truncate(settings.fused_multiplier * settings.top_k);
    fused
}
