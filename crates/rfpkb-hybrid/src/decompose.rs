use regex::Regex;
use std::sync::LazyLock;

use rfpkb_core::config::RetrievalSettings;

const COMPOUND_MARKERS: [&str; 8] = [
    " and ",
    " also ",
    "additionally",
    "provide details on",
    "describe",
    "explain",
    "list all",
    "what about",
];

static JOINER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)[.?!]\s+(also|additionally|furthermore|moreover|specifically|what about|how about)\b").ok()
});

static ENUMERATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(?:\(?(\d{1,2}|[a-z])\)|(\d{1,2})\.)\s+").ok());

static LEADING_FILLER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:also|additionally|furthermore|moreover|specifically)\b[,:]?\s*").ok());

/// `(numeric, position)` of a list label: `3` is `(true, 3)`, `c` is `(false, 3)`.
fn label_position(label: &str) -> Option<(bool, u32)> {
    if let Ok(n) = label.parse::<u32>() {
        return Some((true, n));
    }
    let c = label.chars().next()?;
    c.is_ascii_lowercase().then(|| (false, c as u32 - 'a' as u32 + 1))
}

/// Byte ranges of list markers that number consecutively from 1 (or `a`).
/// Stray numbers such as "SOC 2. " do not start or extend a list.
fn enumeration_markers(question: &str) -> Vec<(usize, usize)> {
    let Some(re) = ENUMERATION.as_ref() else { return vec![] };
    let mut markers: Vec<(usize, usize)> = Vec::new();
    let mut last: Option<(bool, u32)> = None;
    for caps in re.captures_iter(question) {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2))) else { continue };
        let Some((numeric, position)) = label_position(label.as_str()) else { continue };
        let extends = last.is_some_and(|(n, p)| n == numeric && p + 1 == position);
        if extends {
            markers.push((whole.start(), whole.end()));
            last = Some((numeric, position));
        } else if position == 1 && markers.len() < 2 {
            markers = vec![(whole.start(), whole.end())];
            last = Some((numeric, position));
        }
    }
    if markers.len() < 2 { vec![] } else { markers }
}

fn should_decompose(question: &str, settings: &RetrievalSettings) -> bool {
    if question.split_whitespace().count() <= settings.decompose_min_words {
        return false;
    }
    let lower = question.to_lowercase();
    COMPOUND_MARKERS.iter().any(|m| lower.contains(m)) || !enumeration_markers(question).is_empty()
}

/// `"Preamble: 1) a 2) b"` becomes `["Preamble: a", "Preamble: b"]`.
fn split_enumerated(question: &str) -> Vec<String> {
    let markers = enumeration_markers(question);
    let Some(&(first, _)) = markers.first() else { return vec![question.to_string()] };
    let preamble = question[..first].trim();
    markers
        .iter()
        .enumerate()
        .map(|(i, &(_, item_start))| {
            let end = markers.get(i + 1).map(|&(next, _)| next).unwrap_or(question.len());
            let item = question[item_start..end].trim().trim_end_matches([',', ';']).trim();
            if preamble.is_empty() { item.to_string() } else { format!("{} {}", preamble, item) }
        })
        .collect()
}

/// Split after sentence punctuation that introduces a follow-up question.
fn split_on_joiners(text: &str) -> Vec<String> {
    let Some(re) = JOINER.as_ref() else { return vec![text.to_string()] };
    let mut parts = Vec::new();
    let mut start = 0;
    for caps in re.captures_iter(text) {
        let (Some(whole), Some(word)) = (caps.get(0), caps.get(1)) else { continue };
        parts.push(text[start..whole.start() + 1].to_string());
        start = word.start();
    }
    parts.push(text[start..].to_string());
    parts
}

fn strip_filler(part: &str) -> String {
    let part = part.trim();
    match LEADING_FILLER.as_ref() {
        Some(re) => re.replace(part, "").trim().to_string(),
        None => part.to_string(),
    }
}

/// Independent sub-questions of a long compound question, at most
/// `max_sub_queries`. Anything short, simple or unsplittable comes back as
/// `[question]`; the result is never empty.
pub fn decompose(question: &str, settings: &RetrievalSettings) -> Vec<String> {
    let trimmed = question.trim();
    if trimmed.is_empty() || !should_decompose(trimmed, settings) {
        return vec![trimmed.to_string()];
    }
    let mut parts: Vec<String> = Vec::new();
    for piece in split_enumerated(trimmed).iter().flat_map(|p| split_on_joiners(p)) {
        let piece = strip_filler(&piece);
        if !piece.is_empty() && !parts.contains(&piece) {
            parts.push(piece);
        }
    }
    if parts.len() < 2 {
        return vec![trimmed.to_string()];
    }
    parts.truncate(settings.max_sub_queries.max(1));
    parts
}
