use rfpkb_core::similarity::{cosine_similarity, sequence_ratio, string_similarity, ALPHANUMERIC_MATCH};

#[test]
fn exact_match_after_trim_and_case() {
    assert_eq!(string_similarity("  SOC2 Certified ", "soc2 certified"), 1.0);
}

#[test]
fn separator_only_difference_scores_alphanumeric_bonus() {
    assert_eq!(string_similarity("employee_count", "Employee Count"), ALPHANUMERIC_MATCH);
}

#[test]
fn sequence_ratio_matches_block_matching() {
    assert!((sequence_ratio("abcd", "bcde") - 0.75).abs() < 1e-6);
    assert!((sequence_ratio("400", "450") - 2.0 / 3.0).abs() < 1e-6);
    assert_eq!(sequence_ratio("", ""), 1.0);
    assert_eq!(sequence_ratio("abc", ""), 0.0);
    assert_eq!(sequence_ratio("abc", "xyz"), 0.0);
}

#[test]
fn string_similarity_is_bounded() {
    for (a, b) in [("headquarters", "hq location"), ("x", "yyyy"), ("data retention", "data retention policy")] {
        let s = string_similarity(a, b);
        assert!((0.0..=1.0).contains(&s), "{a} vs {b} = {s}");
    }
}

#[test]
fn cosine_is_symmetric_and_bounded() {
    let a = [0.3f32, -1.2, 4.0, 0.01];
    let b = [1.1f32, 0.4, -0.2, 2.5];
    assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    let s = cosine_similarity(&a, &b);
    assert!((-1.0..=1.0).contains(&s));
}

#[test]
fn cosine_degenerate_inputs_score_zero() {
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[], &[]), 0.0);
}
