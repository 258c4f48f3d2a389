use std::collections::HashSet;

use rfpkb_core::data_processor::estimate_tokens;

/// Lowercased, trimmed first `prefix_chars` characters.
pub fn prefix_signature(text: &str, prefix_chars: usize) -> String {
    text.trim().to_lowercase().chars().take(prefix_chars).collect()
}

/// Drop items whose prefix signature was already seen; rank order is kept.
pub fn dedup_by_prefix<T, F>(items: Vec<T>, prefix_chars: usize, text: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(prefix_signature(text(item), prefix_chars))).collect()
}

/// Take items in order while their estimated tokens fit `budget`. The first
/// item is always kept, even when it alone exceeds the budget.
pub fn pack<T, F>(items: Vec<T>, budget: usize, text: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut used = 0usize;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let cost = estimate_tokens(text(&item));
        if !out.is_empty() && used + cost > budget {
            break;
        }
        used += cost;
        out.push(item);
    }
    out
}
