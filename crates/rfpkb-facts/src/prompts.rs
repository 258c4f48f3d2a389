use rfpkb_core::types::Conflict;

pub const CONFLICT_SYSTEM: &str = "You reconcile conflicting company attribute records. \
Keep the knowledge base accurate and current. Answer with a single JSON object.";

pub fn conflict_prompt(conflict: &Conflict) -> String {
    let existing = &conflict.existing_attribute;
    let new = &conflict.new_attribute;
    format!(
        "Two attribute records may describe the same fact.\n\n\
         Existing attribute:\n  key: {}\n  value: {}\n  category: {}\n  last updated: {}\n\n\
         New attribute (just extracted from a document):\n  key: {}\n  value: {}\n  category: {}\n\n\
         Choose one decision:\n\
         - keep_existing: the new record is redundant or less accurate\n\
         - keep_new: the new record is more accurate or supersedes the old one\n\
         - merge_both: both carry information worth keeping; supply merged_value\n\n\
         Respond with JSON: {{\"decision\": \"keep_existing|keep_new|merge_both\", \"reason\": \"...\", \"merged_value\": \"only for merge_both\"}}",
        existing.key,
        existing.value,
        existing.category,
        existing.last_updated.format("%Y-%m-%d"),
        new.key,
        new.value,
        new.category,
    )
}
