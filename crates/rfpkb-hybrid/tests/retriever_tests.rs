use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rfpkb_core::config::RetrievalSettings;
use rfpkb_core::traits::{Embedder, Reranker};
use rfpkb_core::types::{Chunk, Meta, RerankHit, TenantId};
use rfpkb_hybrid::{Corpus, HybridRetriever};

const AXES: [&str; 4] = ["encrypt", "employ", "soc", "office"];

/// One dimension per topic word; a text's vector counts words touching it.
struct TopicEmbedder;

impl TopicEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        AXES.iter().map(|axis| lower.split_whitespace().filter(|w| w.contains(axis)).count() as f32).collect()
    }
}

#[async_trait]
impl Embedder for TopicEmbedder {
    fn dim(&self) -> usize { AXES.len() }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

struct BrokenEmbedder;

#[async_trait]
impl Embedder for BrokenEmbedder {
    fn dim(&self) -> usize { AXES.len() }

    async fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding service unavailable")
    }
}

enum ScriptedReranker {
    Failing,
    Slow,
    OutOfRange,
    Prefers(&'static str),
}

#[async_trait]
impl Reranker for ScriptedReranker {
    async fn rerank(&self, _query: &str, documents: &[String]) -> anyhow::Result<Vec<RerankHit>> {
        match self {
            ScriptedReranker::Failing => anyhow::bail!("rerank 500"),
            ScriptedReranker::Slow => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(vec![])
            }
            ScriptedReranker::OutOfRange => Ok(vec![RerankHit { index: 99, relevance: 0.9 }]),
            ScriptedReranker::Prefers(word) => Ok(documents
                .iter()
                .enumerate()
                .map(|(index, d)| RerankHit { index, relevance: if d.contains(word) { 0.9 } else { 0.1 } })
                .collect()),
        }
    }
}

fn chunk(id: &str, text: &str, embedded: bool) -> Chunk {
    let (document_id, index) = id.split_once(':').unwrap();
    Chunk {
        id: id.to_string(),
        tenant_id: TenantId::new("acme").unwrap(),
        document_id: document_id.to_string(),
        chunk_index: index.parse().unwrap(),
        text: text.to_string(),
        embedding: embedded.then(|| TopicEmbedder::vector(text)),
        metadata: Meta::new(),
    }
}

fn corpus() -> Corpus {
    Corpus::build(vec![
        chunk("security:0", "All customer data is encrypted at rest with AES-256.", true),
        chunk("security:1", "Encryption keys are rotated every ninety days.", false),
        chunk("hr:0", "The company employs 450 people across three offices.", true),
        chunk("hr:1", "The company employs 450 people across three offices.", true),
        chunk("misc:0", "The cafeteria serves lunch daily.", true),
    ])
    .unwrap()
}

fn retriever(reranker: Option<ScriptedReranker>) -> HybridRetriever {
    let settings = RetrievalSettings { rerank_timeout_ms: 50, ..RetrievalSettings::default() };
    HybridRetriever::new(Arc::new(TopicEmbedder), reranker.map(|r| Arc::new(r) as Arc<dyn Reranker>), settings)
}

fn ids(r: &rfpkb_hybrid::Retrieval) -> Vec<String> {
    r.candidates.iter().map(|c| c.chunk.id.clone()).collect()
}

#[tokio::test]
async fn best_match_ranks_first_and_context_is_packed() {
    let corpus = corpus();
    let q = "Is customer data encrypted?";
    let r = retriever(None).retrieve(q, &[q.to_string()], &corpus).await;
    assert_eq!(r.candidates[0].chunk.id, "security:0");
    assert!(r.candidates[0].vector_score > 0.0 && r.candidates[0].lexical_score > 0.0);
    assert!(r.is_usable(0.05));
    assert!(!r.reranked);
    assert!(r.context().starts_with("All customer data"));
    for c in &r.candidates {
        assert_eq!(c.rerank_score, c.hybrid_score);
    }
}

#[tokio::test]
async fn chunk_without_embedding_is_still_found_lexically() {
    let corpus = corpus();
    let q = "How often are encryption keys rotated?";
    let r = retriever(None).retrieve(q, &[q.to_string()], &corpus).await;
    let hit = r.candidates.iter().find(|c| c.chunk.id == "security:1").expect("lexical hit");
    assert_eq!(hit.vector_score, 0.0);
    assert!(hit.lexical_score > 0.0);
}

#[tokio::test]
async fn sub_queries_union_by_chunk_and_near_duplicates_collapse() {
    let corpus = corpus();
    let subs = vec!["company employs".to_string(), "three offices".to_string()];
    let r = retriever(None).retrieve("How many people and offices?", &subs, &corpus).await;
    let ids = ids(&r);
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
    let hr: Vec<_> = ids.iter().filter(|id| id.starts_with("hr:")).collect();
    assert_eq!(hr.len(), 1, "identical text kept once");
    assert_eq!(r.sub_queries, subs);
}

#[tokio::test]
async fn failing_or_slow_reranker_keeps_fused_order() {
    let corpus = corpus();
    let q = "Is customer data encrypted?";
    let baseline = retriever(None).retrieve(q, &[q.to_string()], &corpus).await;
    for reranker in [ScriptedReranker::Failing, ScriptedReranker::Slow, ScriptedReranker::OutOfRange] {
        let r = retriever(Some(reranker)).retrieve(q, &[q.to_string()], &corpus).await;
        assert!(!r.reranked);
        assert_eq!(ids(&r), ids(&baseline));
        for c in &r.candidates {
            assert_eq!(c.rerank_score, c.hybrid_score);
        }
    }
}

#[tokio::test]
async fn reranker_order_replaces_fused_order() {
    let corpus = corpus();
    let q = "Is customer data encrypted?";
    let r = retriever(Some(ScriptedReranker::Prefers("cafeteria"))).retrieve(q, &[q.to_string()], &corpus).await;
    assert!(r.reranked);
    assert_eq!(r.candidates[0].chunk.id, "misc:0");
    assert!((r.top_relevance() - 0.9).abs() < 1e-6);
    for w in r.candidates.windows(2) {
        assert!(w[0].rerank_score >= w[1].rerank_score);
    }
}

#[tokio::test]
async fn unrelated_question_is_not_usable() {
    let corpus = corpus();
    let q = "zebra migration patterns";
    let r = retriever(None).retrieve(q, &[q.to_string()], &corpus).await;
    assert!(!r.is_usable(0.05));
}

#[tokio::test]
async fn embedding_outage_degrades_to_lexical() {
    let corpus = corpus();
    let r = HybridRetriever::new(Arc::new(BrokenEmbedder), None, RetrievalSettings::default());
    let q = "encrypted customer data";
    let out = r.retrieve(q, &[q.to_string()], &corpus).await;
    assert_eq!(out.candidates[0].chunk.id, "security:0");
    assert!(out.candidates.iter().all(|c| c.vector_score == 0.0));
}

#[tokio::test]
async fn empty_corpus_yields_nothing() {
    let corpus = Corpus::build(vec![]).unwrap();
    let r = retriever(None).retrieve("anything", &[], &corpus).await;
    assert!(r.candidates.is_empty());
    assert!(!r.is_usable(0.0));
    assert_eq!(r.sub_queries, vec!["anything".to_string()]);
}
