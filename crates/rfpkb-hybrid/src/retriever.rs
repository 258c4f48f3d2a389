use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use rfpkb_core::config::RetrievalSettings;
use rfpkb_core::traits::{Embedder, Reranker};
use rfpkb_core::types::{Candidate, SearchHit};

use crate::corpus::Corpus;
use crate::fusion::{fuse, vector_hits};
use crate::pack::{dedup_by_prefix, pack};
use crate::rerank::rerank_or_fallback;

/// Outcome of one retrieval request.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub sub_queries: Vec<String>,
    /// Packed context in rank order.
    pub candidates: Vec<Candidate>,
    pub reranked: bool,
}

impl Retrieval {
    /// Rerank score of the best candidate (the fused score when reranking
    /// was skipped or failed).
    pub fn top_relevance(&self) -> f32 {
        self.candidates.first().map(|c| c.rerank_score).unwrap_or(0.0)
    }

    /// Whether anything cleared the relevance floor.
    pub fn is_usable(&self, floor: f32) -> bool {
        !self.candidates.is_empty() && self.top_relevance() >= floor
    }

    pub fn context(&self) -> String {
        self.candidates.iter().map(|c| c.chunk.text.as_str()).collect::<Vec<_>>().join("\n\n")
    }
}

pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    reranker: Option<Arc<dyn Reranker>>,
    settings: RetrievalSettings,
}

impl HybridRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, reranker: Option<Arc<dyn Reranker>>, settings: RetrievalSettings) -> Self {
        Self { embedder, reranker, settings }
    }

    pub fn settings(&self) -> &RetrievalSettings { &self.settings }

    /// Both signals for one sub-query. A failing signal is logged and
    /// contributes nothing.
    async fn sub_query_hits(&self, sub_query: &str, corpus: &Corpus) -> Vec<SearchHit> {
        let depth = self.settings.candidate_multiplier * self.settings.top_k;
        let mut hits = match self.embedder.embed(sub_query).await {
            Ok(q) => vector_hits(&q, corpus, depth),
            Err(e) => {
                warn!(sub_query, error = %e, "query embedding failed, lexical signal only");
                Vec::new()
            }
        };
        match corpus.lexical().search(sub_query, depth) {
            Ok(lexical) => hits.extend(lexical),
            Err(e) => warn!(sub_query, error = %e, "lexical search failed, vector signal only"),
        }
        hits
    }

    /// Fan out over `sub_queries`, fuse, rerank against `question`, dedup,
    /// keep `top_k` and pack into the token budget.
    pub async fn retrieve(&self, question: &str, sub_queries: &[String], corpus: &Corpus) -> Retrieval {
        let sub_queries: Vec<String> = if sub_queries.is_empty() { vec![question.to_string()] } else { sub_queries.to_vec() };
        if corpus.is_empty() {
            return Retrieval { sub_queries, ..Default::default() };
        }

        let per_query = join_all(sub_queries.iter().map(|q| self.sub_query_hits(q, corpus))).await;
        let fused = fuse(per_query.into_iter().flatten(), corpus, &self.settings);
        debug!(sub_queries = sub_queries.len(), fused = fused.len(), "fused candidates");

        let (ranked, reranked) = match &self.reranker {
            Some(reranker) => {
                let timeout = Duration::from_millis(self.settings.rerank_timeout_ms);
                rerank_or_fallback(reranker.as_ref(), question, fused, timeout).await
            }
            None => (fused, false),
        };

        let mut unique = dedup_by_prefix(ranked, self.settings.dedup_prefix_chars, |c: &Candidate| c.chunk.text.as_str());
        unique.truncate(self.settings.top_k);
        let candidates = pack(unique, self.settings.token_budget, |c: &Candidate| c.chunk.text.as_str());

        let retrieval = Retrieval { sub_queries, candidates, reranked };
        info!(
            sub_queries = retrieval.sub_queries.len(),
            candidates = retrieval.candidates.len(),
            reranked,
            top_relevance = retrieval.top_relevance(),
            "retrieval complete"
        );
        retrieval
    }
}
