use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use rfpkb_core::config::ResolverSettings;
use rfpkb_core::similarity::{normalize_key, string_similarity};
use rfpkb_core::traits::{strip_code_fence, Judge};
use rfpkb_core::types::{
    Attribute, AttributeUpdate, Conflict, ConflictType, Decision, NewAttribute, Resolution, ResolutionMethod, WritePlan,
};

use crate::prompts::{conflict_prompt, CONFLICT_SYSTEM};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    pub kept_existing: usize,
    pub kept_new: usize,
    pub merged: usize,
    pub total_conflicts: usize,
    pub inserted: usize,
}

/// Everything one batch resolved to. `plan` is what the store must apply.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    pub deduplicated: Vec<NewAttribute>,
    pub conflicts: Vec<Conflict>,
    pub resolutions: Vec<Resolution>,
    #[serde(skip)]
    pub plan: WritePlan,
    pub stats: ResolutionStats,
}

#[derive(Deserialize)]
struct Judgment {
    decision: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    merged_value: Option<String>,
}

pub struct ConflictResolver {
    settings: ResolverSettings,
    judge: Option<Arc<dyn Judge>>,
}

impl ConflictResolver {
    pub fn new(settings: ResolverSettings, judge: Option<Arc<dyn Judge>>) -> Self {
        Self { settings, judge }
    }

    pub fn settings(&self) -> &ResolverSettings { &self.settings }

    /// Collapse attributes sharing a normalized key. The group stays at the
    /// position of its first member; a later member replaces it only when
    /// its value is strictly longer.
    pub fn dedup_batch(&self, batch: &[NewAttribute]) -> Vec<NewAttribute> {
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut out: Vec<NewAttribute> = Vec::with_capacity(batch.len());
        for attr in batch {
            let key = normalize_key(&attr.key);
            match slots.get(&key) {
                Some(&slot) => {
                    if attr.value.chars().count() > out[slot].value.chars().count() {
                        out[slot] = attr.clone();
                    }
                }
                None => {
                    slots.insert(key, out.len());
                    out.push(attr.clone());
                }
            }
        }
        out
    }

    pub fn classify(&self, key_similarity: f32, value_similarity: f32) -> ConflictType {
        let s = &self.settings;
        if key_similarity >= s.same_key {
            if value_similarity > s.duplicate_value { ConflictType::Duplicate } else { ConflictType::Update }
        } else if key_similarity > s.similar_key {
            ConflictType::Similar
        } else {
            ConflictType::Ambiguous
        }
    }

    /// Best accepted match in `existing` for `new`, if any. Only candidates
    /// past the key gate compete; ties keep the earlier stored attribute.
    pub fn best_match(&self, existing: &[Attribute], new: &NewAttribute) -> Option<Conflict> {
        let s = &self.settings;
        let mut best: Option<Conflict> = None;
        for candidate in existing {
            let key_similarity = string_similarity(&new.key, &candidate.key);
            if key_similarity <= s.key_gate { continue; }
            let value_similarity = string_similarity(&new.value, &candidate.value);
            let category_match = normalize_key(&new.category) == normalize_key(&candidate.category);
            let score = s.key_weight * key_similarity
                + s.value_weight * value_similarity
                + if category_match { s.category_weight } else { 0.0 };
            if score <= s.accept_threshold { continue; }
            if best.as_ref().is_some_and(|b| b.similarity >= score) { continue; }
            best = Some(Conflict {
                new_attribute: new.clone(),
                existing_attribute: candidate.clone(),
                key_similarity,
                value_similarity,
                category_match,
                similarity: score,
                conflict_type: self.classify(key_similarity, value_similarity),
            });
        }
        best
    }

    /// Split a deduplicated batch into conflicts and attributes with no match.
    pub fn find_conflicts(&self, existing: &[Attribute], batch: &[NewAttribute]) -> (Vec<Conflict>, Vec<NewAttribute>) {
        let mut conflicts = Vec::new();
        let mut unmatched = Vec::new();
        for attr in batch {
            match self.best_match(existing, attr) {
                Some(conflict) => conflicts.push(conflict),
                None => unmatched.push(attr.clone()),
            }
        }
        (conflicts, unmatched)
    }

    /// Rules for duplicates and updates; the judge for everything else.
    /// Never fails: an absent or misbehaving judge yields `keep_existing`.
    pub async fn resolve_conflict(&self, conflict: Conflict) -> Resolution {
        match conflict.conflict_type {
            ConflictType::Duplicate => Resolution {
                conflict,
                decision: Decision::KeepExisting,
                reason: "duplicate, values identical".to_string(),
                merged_value: None,
                method: ResolutionMethod::Rule,
            },
            ConflictType::Update => Resolution {
                conflict,
                decision: Decision::KeepNew,
                reason: "same key, updated value".to_string(),
                merged_value: None,
                method: ResolutionMethod::Rule,
            },
            ConflictType::Similar | ConflictType::Ambiguous => self.judge_conflict(conflict).await,
        }
    }

    async fn judge_conflict(&self, conflict: Conflict) -> Resolution {
        let Some(judge) = &self.judge else {
            return fallback(conflict, "no judge configured");
        };
        let raw = match judge.judge(CONFLICT_SYSTEM, &conflict_prompt(&conflict)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %conflict.new_attribute.key, error = %e, "conflict judgment failed");
                return fallback(conflict, "judgment call failed");
            }
        };
        match parse_judgment(&raw) {
            Some((decision, reason, merged_value)) => Resolution {
                conflict,
                decision,
                reason,
                merged_value,
                method: ResolutionMethod::ExternalJudgment,
            },
            None => {
                warn!(key = %conflict.new_attribute.key, "malformed conflict judgment");
                fallback(conflict, "malformed judgment")
            }
        }
    }

    /// Full pass over one batch: dedup, match, resolve, plan.
    pub async fn resolve(&self, existing: &[Attribute], batch: &[NewAttribute]) -> ResolutionReport {
        if batch.is_empty() {
            return ResolutionReport::default();
        }
        let deduplicated = self.dedup_batch(batch);
        let (conflicts, unmatched) = self.find_conflicts(existing, &deduplicated);
        let mut resolutions = Vec::with_capacity(conflicts.len());
        for conflict in conflicts.iter().cloned() {
            let resolution = self.resolve_conflict(conflict).await;
            debug!(
                key = %resolution.conflict.new_attribute.key,
                conflict_type = ?resolution.conflict.conflict_type,
                decision = ?resolution.decision,
                method = ?resolution.method,
                "resolved conflict"
            );
            resolutions.push(resolution);
        }
        let (plan, stats) = plan(&resolutions, unmatched);
        info!(
            batch = batch.len(),
            conflicts = stats.total_conflicts,
            kept_existing = stats.kept_existing,
            kept_new = stats.kept_new,
            merged = stats.merged,
            inserted = stats.inserted,
            "resolved attribute batch"
        );
        ResolutionReport { deduplicated, conflicts, resolutions, plan, stats }
    }
}

fn fallback(conflict: Conflict, why: &str) -> Resolution {
    Resolution {
        conflict,
        decision: Decision::KeepExisting,
        reason: format!("fallback: {}", why),
        merged_value: None,
        method: ResolutionMethod::Fallback,
    }
}

fn parse_judgment(raw: &str) -> Option<(Decision, String, Option<String>)> {
    let judgment: Judgment = serde_json::from_str(strip_code_fence(raw)).ok()?;
    let decision = match judgment.decision.trim() {
        "keep_existing" => Decision::KeepExisting,
        "keep_new" => Decision::KeepNew,
        "merge_both" => Decision::MergeBoth,
        _ => return None,
    };
    let merged_value = judgment.merged_value.filter(|v| !v.trim().is_empty());
    if decision == Decision::MergeBoth && merged_value.is_none() {
        return None;
    }
    let merged_value = if decision == Decision::MergeBoth { merged_value } else { None };
    Some((decision, judgment.reason, merged_value))
}

/// Turn resolutions into guarded writes. Several new attributes resolving
/// onto the same stored row collapse into one update; the last one wins.
pub fn plan(resolutions: &[Resolution], unmatched: Vec<NewAttribute>) -> (WritePlan, ResolutionStats) {
    let mut stats = ResolutionStats { total_conflicts: resolutions.len(), ..Default::default() };
    let mut updates: Vec<AttributeUpdate> = Vec::new();
    for resolution in resolutions {
        let value = match resolution.decision {
            Decision::KeepExisting => {
                stats.kept_existing += 1;
                continue;
            }
            Decision::KeepNew => {
                stats.kept_new += 1;
                resolution.conflict.new_attribute.value.clone()
            }
            Decision::MergeBoth => {
                stats.merged += 1;
                resolution
                    .merged_value
                    .clone()
                    .unwrap_or_else(|| resolution.conflict.new_attribute.value.clone())
            }
        };
        let existing = &resolution.conflict.existing_attribute;
        let update = AttributeUpdate {
            id: existing.id.clone(),
            observed_last_updated: existing.last_updated,
            value,
            source_document_id: resolution.conflict.new_attribute.source_document_id.clone(),
        };
        match updates.iter_mut().find(|u| u.id == update.id) {
            Some(slot) => *slot = update,
            None => updates.push(update),
        }
    }
    stats.inserted = unmatched.len();
    (WritePlan { updates, inserts: unmatched, base_version: None }, stats)
}
