//! Pure similarity primitives. No state, no I/O.

/// Score awarded when two strings differ only in punctuation, spacing or
/// separators (`employee_count` vs `Employee Count`).
pub const ALPHANUMERIC_MATCH: f32 = 0.95;

/// Lowercased, trimmed form used as the identity of an attribute key.
pub fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase()
}

fn alphanumeric_only(s: &str) -> String {
    s.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Case-insensitive similarity in [0, 1].
///
/// 1.0 for equality after trimming, [`ALPHANUMERIC_MATCH`] for equality once
/// every non-alphanumeric character is dropped, otherwise the
/// Ratcliff/Obershelp sequence ratio.
pub fn string_similarity(a: &str, b: &str) -> f32 {
    let a = normalize_key(a);
    let b = normalize_key(b);
    if a == b {
        return 1.0;
    }
    if alphanumeric_only(&a) == alphanumeric_only(&b) {
        return ALPHANUMERIC_MATCH;
    }
    sequence_ratio(&a, &b)
}

/// `2·M / T` where `M` counts characters in the recursively found longest
/// matching blocks and `T` is the combined length.
pub fn sequence_ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f32 / total as f32
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }
    matched
}

/// Longest common run of `a[alo..ahi]` and `b[blo..bhi]`; ties keep the run
/// that starts earliest in `a`, then in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];
    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo + 1;
            cur[col] = if a[i] == b[j] { prev[col - 1] + 1 } else { 0 };
            if cur[col] > best.2 {
                best = (i + 1 - cur[col], j + 1 - cur[col], cur[col]);
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

/// Cosine similarity in [-1, 1]. Symmetric; mismatched dimensions or a zero
/// vector score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
