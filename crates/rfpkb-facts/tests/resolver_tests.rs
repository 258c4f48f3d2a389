use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rfpkb_core::config::ResolverSettings;
use rfpkb_core::traits::Judge;
use rfpkb_core::types::{Attribute, ConflictType, Decision, NewAttribute, ResolutionMethod, TenantId};
use rfpkb_facts::ConflictResolver;

struct ScriptedJudge {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl ScriptedJudge {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self { reply: Ok(reply.to_string()), calls: AtomicUsize::new(0) })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self { reply: Err("upstream 503".to_string()), calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl Judge for ScriptedJudge {
    async fn judge(&self, _system: &str, prompt: &str) -> anyhow::Result<String> {
        assert!(prompt.contains("last updated: 2024-03-01"));
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

fn existing(id: &str, key: &str, value: &str, category: &str) -> Attribute {
    Attribute {
        id: id.to_string(),
        tenant_id: TenantId::new("acme").unwrap(),
        key: key.to_string(),
        value: value.to_string(),
        category: category.to_string(),
        source_document_id: Some("handbook".to_string()),
        last_updated: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    }
}

fn new(key: &str, value: &str, category: &str) -> NewAttribute {
    NewAttribute {
        key: key.to_string(),
        value: value.to_string(),
        category: category.to_string(),
        source_document_id: Some("rfp-2025".to_string()),
    }
}

fn resolver(judge: Option<Arc<dyn Judge>>) -> ConflictResolver {
    ConflictResolver::new(ResolverSettings::default(), judge)
}

#[tokio::test]
async fn changed_employee_count_is_an_update_and_newer_value_wins() {
    let store = vec![existing("a1", "employee_count", "400", "company")];
    let report = resolver(None).resolve(&store, &[new("Employee Count", "450", "company")]).await;

    assert_eq!(report.conflicts.len(), 1);
    let conflict = &report.conflicts[0];
    assert!(conflict.key_similarity >= 0.95);
    assert!(conflict.value_similarity < 0.9);
    assert_eq!(conflict.conflict_type, ConflictType::Update);

    let resolution = &report.resolutions[0];
    assert_eq!(resolution.decision, Decision::KeepNew);
    assert_eq!(resolution.method, ResolutionMethod::Rule);

    assert_eq!(report.plan.updates.len(), 1);
    assert_eq!(report.plan.updates[0].id, "a1");
    assert_eq!(report.plan.updates[0].value, "450");
    assert_eq!(report.plan.updates[0].source_document_id.as_deref(), Some("rfp-2025"));
    assert!(report.plan.inserts.is_empty());
    assert_eq!(report.stats.kept_new, 1);
}

#[tokio::test]
async fn shorter_new_value_still_wins_on_update() {
    let store = vec![existing("a1", "ceo", "Jane Doe, appointed 2019", "leadership")];
    let report = resolver(None).resolve(&store, &[new("CEO", "Jane Roe", "leadership")]).await;
    assert_eq!(report.conflicts[0].conflict_type, ConflictType::Update);
    assert_eq!(report.resolutions[0].decision, Decision::KeepNew);
}

#[tokio::test]
async fn same_normalized_key_and_value_is_a_duplicate() {
    let store = vec![existing("a1", "SOC2 Certified", "Yes, Type II", "compliance")];
    let report = resolver(None).resolve(&store, &[new(" soc2 certified ", "yes, type ii", "compliance")]).await;

    assert_eq!(report.conflicts[0].conflict_type, ConflictType::Duplicate);
    assert_eq!(report.resolutions[0].decision, Decision::KeepExisting);
    assert_eq!(report.resolutions[0].method, ResolutionMethod::Rule);
    assert!(report.plan.is_empty());
    assert_eq!(report.stats.kept_existing, 1);
}

#[tokio::test]
async fn empty_inputs() {
    let r = resolver(None);
    let report = r.resolve(&[], &[new("ceo", "Jane", "leadership"), new("hq", "Austin", "company")]).await;
    assert!(report.conflicts.is_empty());
    assert_eq!(report.plan.inserts.len(), 2);
    assert_eq!(report.stats.inserted, 2);

    let store = vec![existing("a1", "ceo", "Jane", "leadership")];
    let report = r.resolve(&store, &[]).await;
    assert!(report.conflicts.is_empty());
    assert!(report.resolutions.is_empty());
    assert!(report.plan.is_empty());
}

#[test]
fn dedup_keeps_first_position_and_longest_value() {
    let batch = vec![
        new("Employee Count", "450", "company"),
        new("ceo", "Jane", "leadership"),
        new(" employee count", "approximately 450 full-time staff", "company"),
        new("EMPLOYEE COUNT", "451", "company"),
    ];
    let out = resolver(None).dedup_batch(&batch);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].value, "approximately 450 full-time staff");
    assert_eq!(out[1].key, "ceo");
}

#[tokio::test]
async fn category_is_scored_not_assumed() {
    let store = vec![existing("a1", "headquarters", "Austin, TX", "company")];
    let r = resolver(None);

    let other_category = r.resolve(&store, &[new("headquarters", "Berlin", "location")]).await;
    assert!(other_category.conflicts.is_empty(), "weak value match across categories stays below threshold");
    assert_eq!(other_category.plan.inserts.len(), 1);

    let same_category = r.resolve(&store, &[new("headquarters", "Berlin", "company")]).await;
    assert_eq!(same_category.conflicts.len(), 1);
    assert!(same_category.conflicts[0].category_match);
    assert_eq!(same_category.conflicts[0].conflict_type, ConflictType::Update);

    let same_value = r.resolve(&store, &[new("headquarters", "Austin, TX", "location")]).await;
    assert_eq!(same_value.conflicts[0].conflict_type, ConflictType::Duplicate);
    assert!(!same_value.conflicts[0].category_match);
}

#[tokio::test]
async fn similar_keys_are_judged() {
    let judge = ScriptedJudge::replying(r#"{"decision": "merge_both", "reason": "both useful", "merged_value": "24/7, by phone and chat"}"#);
    let r = resolver(Some(judge.clone()));
    let store = vec![existing("a1", "support_hours", "24/7", "support")];
    let report = r.resolve(&store, &[new("support_hours_us", "24/7 by phone", "support")]).await;

    assert_eq!(report.conflicts[0].conflict_type, ConflictType::Similar);
    assert_eq!(judge.calls.load(Ordering::SeqCst), 1);
    let resolution = &report.resolutions[0];
    assert_eq!(resolution.decision, Decision::MergeBoth);
    assert_eq!(resolution.method, ResolutionMethod::ExternalJudgment);
    assert_eq!(report.plan.updates[0].value, "24/7, by phone and chat");
    assert_eq!(report.stats.merged, 1);
}

#[tokio::test]
async fn fenced_judgment_is_accepted() {
    let judge = ScriptedJudge::replying("```json\n{\"decision\": \"keep_new\", \"reason\": \"more precise\"}\n```");
    let store = vec![existing("a1", "annual_revenue", "$12M", "finance")];
    let report = resolver(Some(judge)).resolve(&store, &[new("annual revenue usd", "$12M", "finance")]).await;
    assert_eq!(report.conflicts[0].conflict_type, ConflictType::Ambiguous);
    assert_eq!(report.resolutions[0].decision, Decision::KeepNew);
    assert_eq!(report.resolutions[0].method, ResolutionMethod::ExternalJudgment);
}

#[tokio::test]
async fn bad_judgments_fall_back_to_keep_existing() {
    let store = vec![existing("a1", "support_hours", "24/7", "support")];
    let batch = [new("support_hours_us", "24/7 by phone", "support")];
    let judges: Vec<Option<Arc<dyn Judge>>> = vec![
        None,
        Some(ScriptedJudge::failing()),
        Some(ScriptedJudge::replying("I think you should keep the new one")),
        Some(ScriptedJudge::replying(r#"{"decision": "replace", "reason": "?"}"#)),
        Some(ScriptedJudge::replying(r#"{"decision": "merge_both", "reason": "no value given"}"#)),
        Some(ScriptedJudge::replying(r#"{"decision": "merge_both", "merged_value": "  "}"#)),
    ];
    for judge in judges {
        let report = resolver(judge).resolve(&store, &batch).await;
        let resolution = &report.resolutions[0];
        assert_eq!(resolution.decision, Decision::KeepExisting);
        assert_eq!(resolution.method, ResolutionMethod::Fallback);
        assert!(report.plan.is_empty());
    }
}

#[tokio::test]
async fn resolving_twice_gives_identical_results() {
    let judge = ScriptedJudge::replying(r#"{"decision": "keep_existing", "reason": "redundant"}"#);
    let r = resolver(Some(judge));
    let store = vec![
        existing("a1", "employee_count", "400", "company"),
        existing("a2", "support_hours", "24/7", "support"),
        existing("a3", "soc2", "Type II", "compliance"),
    ];
    let batch = vec![
        new("Employee Count", "450", "company"),
        new("support_hours_us", "24/7 by phone", "support"),
        new("SOC2", "type ii", "compliance"),
        new("founded", "2009", "company"),
    ];
    let first = r.resolve(&store, &batch).await;
    let second = r.resolve(&store, &batch).await;
    assert_eq!(first.resolutions, second.resolutions);
    assert_eq!(first.plan, second.plan);
    assert_eq!(first.stats, second.stats);
}

#[tokio::test]
async fn updates_onto_one_row_collapse_last_wins() {
    let store = vec![existing("a1", "employee_count", "400", "company")];
    let batch = vec![new("Employee Count", "450", "company"), new("employee-count", "460", "company")];
    let report = resolver(None).resolve(&store, &batch).await;
    assert_eq!(report.resolutions.len(), 2);
    assert_eq!(report.plan.updates.len(), 1);
    assert_eq!(report.plan.updates[0].value, "460");
    assert_eq!(report.stats.kept_new, 2);
}
