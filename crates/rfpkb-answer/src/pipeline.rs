//! Per-question answering: Decompose, Shortcut, Retrieve, Generate, Score.
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use rfpkb_core::config::Settings;
use rfpkb_core::error::{Error, Result};
use rfpkb_core::traits::{AttributeStore, ChunkStore, Embedder, Generator, Judge, Reranker};
use rfpkb_core::types::{AnswerEnvelope, Source, SourceType, TenantId};
use rfpkb_hybrid::{decompose, Corpus, HybridRetriever, Retrieval};

use crate::prompts::{attribute_prompt, rag_prompt, NO_ANSWER};
use crate::shortcut::{rank_attributes, AttributeMatch};
use crate::trust::{TrustInputs, TrustScorer};

/// Collaborators shared by every request.
#[derive(Clone)]
pub struct Services {
    pub embedder: Arc<dyn Embedder>,
    pub reranker: Option<Arc<dyn Reranker>>,
    pub generator: Arc<dyn Generator>,
    pub quality_judge: Option<Arc<dyn Judge>>,
    pub chunks: Arc<dyn ChunkStore>,
    pub attributes: Arc<dyn AttributeStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    AttributeAnswer,
    RagAnswer,
    NoAnswer,
}

/// Everything one request produced on its way to the envelope.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub tenant: TenantId,
    pub question: String,
    pub sub_queries: Vec<String>,
    pub attribute_matches: Vec<AttributeMatch>,
    /// `None` when the shortcut answered before retrieval ran.
    pub retrieval: Option<Retrieval>,
    pub outcome: Outcome,
    pub envelope: AnswerEnvelope,
}

pub struct KnowledgeEngine {
    services: Services,
    retriever: HybridRetriever,
    scorer: TrustScorer,
    settings: Settings,
}

impl KnowledgeEngine {
    pub fn new(services: Services, settings: Settings) -> Self {
        let retriever = HybridRetriever::new(services.embedder.clone(), services.reranker.clone(), settings.retrieval.clone());
        let scorer = TrustScorer::new(settings.trust.clone());
        Self { services, retriever, scorer, settings }
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub async fn answer(&self, tenant: &str, question: &str) -> Result<AnswerEnvelope> {
        Ok(self.run(tenant, question).await?.envelope)
    }

    /// Answers `questions` with bounded concurrency; results keep input order
    /// and one failure does not affect the others.
    pub async fn answer_batch(&self, tenant: &str, questions: &[String]) -> Vec<Result<AnswerEnvelope>> {
        let concurrency = self.settings.batch.concurrency.max(1);
        info!(tenant, questions = questions.len(), concurrency, "answering batch");
        stream::iter(questions.iter())
            .map(|q| self.answer(tenant, q))
            .buffered(concurrency)
            .collect()
            .await
    }

    pub async fn run(&self, tenant: &str, question: &str) -> Result<PipelineState> {
        let tenant = TenantId::new(tenant)?;
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::Operation("question is empty".to_string()));
        }

        let attributes = self.services.attributes.load(&tenant).await?;
        let sub_queries = decompose(question, &self.settings.retrieval);
        let attribute_matches =
            match rank_attributes(self.services.embedder.as_ref(), question, &attributes, self.settings.shortcut.top_k).await {
                Ok(matches) => matches,
                Err(e) => {
                    warn!(tenant = %tenant, error = %e, "attribute shortcut unavailable");
                    Vec::new()
                }
            };
        let best = attribute_matches.first().map(|m| m.similarity).unwrap_or(0.0);
        debug!(tenant = %tenant, attributes = attributes.len(), best, sub_queries = sub_queries.len(), "shortcut ranked");

        let mut state = PipelineState {
            tenant: tenant.clone(),
            question: question.to_string(),
            sub_queries,
            attribute_matches,
            retrieval: None,
            outcome: Outcome::NoAnswer,
            envelope: no_answer(),
        };

        if !state.attribute_matches.is_empty() && best >= self.settings.shortcut.direct_threshold {
            state.envelope = self.attribute_answer(&state).await?;
            state.outcome = Outcome::AttributeAnswer;
            info!(tenant = %tenant, similarity = best, "answered from attribute");
            return Ok(state);
        }

        let chunks = self.services.chunks.load_corpus(&tenant).await?;
        if chunks.is_empty() && attributes.is_empty() {
            return Err(Error::EmptyKnowledgeBase(tenant.to_string()));
        }
        let corpus = Corpus::build(chunks)?;
        let retrieval = self.retriever.retrieve(question, &state.sub_queries, &corpus).await;
        let usable = retrieval.is_usable(self.settings.retrieval.relevance_floor);
        state.retrieval = Some(retrieval);

        if usable {
            state.envelope = self.rag_answer(&state).await?;
            state.outcome = Outcome::RagAnswer;
        } else if !state.attribute_matches.is_empty() && best >= self.settings.shortcut.fallback_threshold {
            state.envelope = self.attribute_answer(&state).await?;
            state.outcome = Outcome::AttributeAnswer;
        }
        info!(tenant = %tenant, outcome = ?state.outcome, trust = state.envelope.trust_score, "answered");
        Ok(state)
    }

    async fn attribute_answer(&self, state: &PipelineState) -> Result<AnswerEnvelope> {
        let Some(top) = state.attribute_matches.first() else { return Ok(no_answer()) };
        let prompt = attribute_prompt(&state.question, &top.attribute);
        let answer_text = self.services.generator.generate(&prompt).await.map_err(Error::Generation)?;
        let supporting: Vec<f32> = state.attribute_matches.iter().map(|m| m.similarity).collect();
        let inputs = TrustInputs {
            question: &state.question,
            answer: &answer_text,
            source_type: SourceType::Attribute,
            primary: top.similarity,
            supporting: &supporting,
            source_count: 1,
        };
        let trust_score = self.trust(&inputs).await;
        Ok(AnswerEnvelope {
            sources: vec![Source::Attribute {
                key: top.attribute.key.clone(),
                value: top.attribute.value.clone(),
                category: top.attribute.category.clone(),
                similarity: top.similarity,
            }],
            answer_text,
            trust_score,
            source_type: SourceType::Attribute,
        })
    }

    async fn rag_answer(&self, state: &PipelineState) -> Result<AnswerEnvelope> {
        let Some(retrieval) = &state.retrieval else { return Ok(no_answer()) };
        let prompt = rag_prompt(&retrieval.context(), &state.question);
        let answer_text = self.services.generator.generate(&prompt).await.map_err(Error::Generation)?;
        let supporting: Vec<f32> = retrieval.candidates.iter().map(|c| c.rerank_score).collect();
        let documents: HashSet<&str> = retrieval.candidates.iter().map(|c| c.chunk.document_id.as_str()).collect();
        let inputs = TrustInputs {
            question: &state.question,
            answer: &answer_text,
            source_type: SourceType::Rag,
            primary: retrieval.top_relevance(),
            supporting: &supporting,
            source_count: documents.len(),
        };
        let trust_score = self.trust(&inputs).await;
        let sources = retrieval
            .candidates
            .iter()
            .map(|c| Source::Chunk {
                chunk_id: c.chunk.id.clone(),
                document_id: c.chunk.document_id.clone(),
                text: c.chunk.text.clone(),
                rerank_score: c.rerank_score,
            })
            .collect();
        Ok(AnswerEnvelope { answer_text, trust_score, source_type: SourceType::Rag, sources })
    }

    async fn trust(&self, inputs: &TrustInputs<'_>) -> f32 {
        let judge = if self.settings.services.quality_judge { self.services.quality_judge.as_deref() } else { None };
        self.scorer.score_with_judge(inputs, judge).await
    }
}

fn no_answer() -> AnswerEnvelope {
    AnswerEnvelope { answer_text: NO_ANSWER.to_string(), trust_score: 0.0, source_type: SourceType::None, sources: vec![] }
}
