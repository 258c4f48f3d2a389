use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

use rfpkb_core::traits::Reranker;
use rfpkb_core::types::{Candidate, RerankHit};

use crate::fusion::by_score_desc;

/// Rerank `candidates` against `question`. Returns the new order and whether
/// the reranker's answer was used. On error, timeout or a malformed answer
/// the fused order comes back unchanged with `rerank_score = hybrid_score`.
pub async fn rerank_or_fallback(
    reranker: &dyn Reranker,
    question: &str,
    candidates: Vec<Candidate>,
    timeout: Duration,
) -> (Vec<Candidate>, bool) {
    if candidates.is_empty() {
        return (candidates, false);
    }
    let documents: Vec<String> = candidates.iter().map(|c| c.chunk.text.clone()).collect();
    let hits = match tokio::time::timeout(timeout, reranker.rerank(question, &documents)).await {
        Ok(Ok(hits)) => hits,
        Ok(Err(e)) => {
            warn!(error = %e, "reranker failed, keeping fused order");
            return (fallback(candidates), false);
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "reranker timed out, keeping fused order");
            return (fallback(candidates), false);
        }
    };
    if !well_formed(&hits, candidates.len()) {
        warn!(returned = hits.len(), submitted = candidates.len(), "malformed rerank response, keeping fused order");
        return (fallback(candidates), false);
    }
    (apply(candidates, hits), true)
}

fn fallback(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    for c in &mut candidates {
        c.rerank_score = c.hybrid_score;
    }
    candidates
}

fn well_formed(hits: &[RerankHit], submitted: usize) -> bool {
    let mut seen = HashSet::new();
    !hits.is_empty() && hits.iter().all(|h| h.index < submitted && h.relevance.is_finite() && seen.insert(h.index))
}

/// Reranked candidates by relevance; any the reranker left out follow in
/// fused order with a rerank score of 0.
fn apply(candidates: Vec<Candidate>, mut hits: Vec<RerankHit>) -> Vec<Candidate> {
    hits.sort_by(|a, b| by_score_desc(a.relevance, b.relevance));
    let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(slots.len());
    for hit in &hits {
        if let Some(mut c) = slots[hit.index].take() {
            c.rerank_score = hit.relevance;
            out.push(c);
        }
    }
    for mut c in slots.into_iter().flatten() {
        c.rerank_score = 0.0;
        out.push(c);
    }
    debug!(reranked = hits.len(), total = out.len(), "applied rerank order");
    out
}
