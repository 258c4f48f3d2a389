//! Trust scoring. The formula is pure and bounded to [0, 100]; an optional
//! quality judgment can be blended in on top.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use rfpkb_core::config::TrustSettings;
use rfpkb_core::traits::{strip_code_fence, Judge};
use rfpkb_core::types::SourceType;

use crate::prompts::{quality_prompt, QUALITY_SYSTEM};

const QUESTION_STOPWORDS: &[&str] = &["what", "does", "your", "please", "provide", "describe"];

pub struct TrustInputs<'a> {
    pub question: &'a str,
    pub answer: &'a str,
    pub source_type: SourceType,
    /// Top attribute similarity or top rerank score.
    pub primary: f32,
    /// Ranked scores of the supporting candidates, best first.
    pub supporting: &'a [f32],
    pub source_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrustBreakdown {
    pub base: f32,
    pub completeness: f32,
    pub source_bonus: f32,
    pub consistency: f32,
    pub total: f32,
}

#[derive(Deserialize)]
struct QualityJudgment {
    score: f32,
}

fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).map(str::to_lowercase)
}

fn finite_or_zero(x: f32) -> f32 {
    if x.is_finite() { x } else { 0.0 }
}

pub struct TrustScorer {
    settings: TrustSettings,
}

impl TrustScorer {
    pub fn new(settings: TrustSettings) -> Self {
        Self { settings }
    }

    pub fn breakdown(&self, inputs: &TrustInputs<'_>) -> TrustBreakdown {
        let s = &self.settings;
        let primary = finite_or_zero(inputs.primary).max(0.0);
        let base = match inputs.source_type {
            SourceType::None => return TrustBreakdown::default(),
            SourceType::Attribute => primary * s.attribute_multiplier,
            SourceType::Rag => (primary * s.rag_multiplier).min(s.rag_cap),
        };

        let words = inputs.answer.split_whitespace().count();
        let length = if s.length_ceiling_words == 0 {
            1.0
        } else {
            (words as f32 / s.length_ceiling_words as f32).min(1.0)
        };
        let completeness = length * s.length_points + self.keyword_coverage(inputs.question, inputs.answer) * s.keyword_points;

        let source_bonus = match s.source_bonus.len() {
            0 => 0.0,
            n => s.source_bonus[inputs.source_count.min(n - 1)],
        };

        let consistency = match inputs.source_type {
            SourceType::Rag => {
                let top: Vec<f32> = inputs.supporting.iter().take(s.rag_consistency_sources).map(|x| finite_or_zero(*x)).collect();
                if top.is_empty() {
                    0.0
                } else {
                    let mean = (top.iter().sum::<f32>() / top.len() as f32).max(0.0);
                    (mean * s.rag_consistency_multiplier).min(s.consistency_cap)
                }
            }
            SourceType::Attribute => match inputs.supporting.get(1).map(|x| finite_or_zero(*x)) {
                Some(second) if second >= s.corroboration_floor => (second * s.corroboration_multiplier).min(s.consistency_cap),
                _ => 0.0,
            },
            SourceType::None => 0.0,
        };

        let total = finite_or_zero(base + completeness + source_bonus + consistency).clamp(0.0, 100.0);
        TrustBreakdown { base, completeness, source_bonus, consistency, total }
    }

    pub fn score(&self, inputs: &TrustInputs<'_>) -> f32 {
        self.breakdown(inputs).total
    }

    /// Fraction of the question's content words that the answer repeats.
    fn keyword_coverage(&self, question: &str, answer: &str) -> f32 {
        let wanted: HashSet<String> = terms(question).filter(|t| t.chars().count() >= 4 && !QUESTION_STOPWORDS.contains(&t.as_str())).collect();
        if wanted.is_empty() {
            return 0.0;
        }
        let present: HashSet<String> = terms(answer).collect();
        wanted.iter().filter(|t| present.contains(*t)).count() as f32 / wanted.len() as f32
    }

    /// The formula score, blended with the judge's quality score when a judge
    /// is supplied and answers with a usable number.
    pub async fn score_with_judge(&self, inputs: &TrustInputs<'_>, judge: Option<&dyn Judge>) -> f32 {
        let formula = self.score(inputs);
        let Some(judge) = judge else { return formula };
        if inputs.source_type == SourceType::None {
            return formula;
        }
        let quality = match judge.judge(QUALITY_SYSTEM, &quality_prompt(inputs.question, inputs.answer)).await {
            Ok(raw) => parse_quality(&raw),
            Err(e) => {
                warn!(error = %e, "quality judgment failed, keeping formula score");
                None
            }
        };
        match quality {
            Some(q) => {
                let w = self.settings.quality_judge_weight.clamp(0.0, 1.0);
                finite_or_zero((1.0 - w) * formula + w * q).clamp(0.0, 100.0)
            }
            None => formula,
        }
    }
}

pub fn parse_quality(raw: &str) -> Option<f32> {
    let parsed: QualityJudgment = serde_json::from_str(strip_code_fence(raw)).ok()?;
    (parsed.score.is_finite() && (0.0..=100.0).contains(&parsed.score)).then_some(parsed.score)
}
