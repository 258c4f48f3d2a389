use proptest::prelude::*;

use rfpkb_core::data_processor::estimate_tokens;
use rfpkb_hybrid::pack::{dedup_by_prefix, pack, prefix_signature};

fn words(n: usize) -> String {
    vec!["word"; n].join(" ")
}

#[test]
fn oversized_first_chunk_is_kept_alone() {
    let huge = words(9000);
    let out = pack(vec![huge.clone(), words(10)], 5000, |s: &String| s.as_str());
    assert_eq!(out, vec![huge]);
}

#[test]
fn packing_stops_at_first_chunk_that_overflows() {
    // 300 words ~ 400 tokens each
    let items = vec![words(300), words(300), words(3000), words(3)];
    let out = pack(items.clone(), 1000, |s: &String| s.as_str());
    assert_eq!(out, items[..2].to_vec());
}

#[test]
fn empty_input_packs_to_nothing() {
    assert!(pack(Vec::<String>::new(), 5000, |s: &String| s.as_str()).is_empty());
}

#[test]
fn dedup_uses_normalized_prefix_first_seen_wins() {
    let common = "x".repeat(250);
    let items = vec![
        format!("  {}A", common.to_uppercase()),
        "unique".to_string(),
        format!("{}B", common),
    ];
    let out = dedup_by_prefix(items.clone(), 200, |s: &String| s.as_str());
    assert_eq!(out, vec![items[0].clone(), items[1].clone()]);
    assert_eq!(prefix_signature("  HeLLo ", 3), "hel");
}

proptest! {
    #[test]
    fn everything_fits_under_budget(sizes in proptest::collection::vec(1usize..60, 0..12)) {
        let items: Vec<String> = sizes.iter().map(|&n| words(n)).collect();
        let total: usize = items.iter().map(|s| estimate_tokens(s)).sum();
        let out = pack(items.clone(), total, |s: &String| s.as_str());
        prop_assert_eq!(out, items);
    }

    #[test]
    fn output_is_a_prefix_within_budget(sizes in proptest::collection::vec(1usize..400, 1..12), budget in 0usize..2000) {
        let items: Vec<String> = sizes.iter().map(|&n| words(n)).collect();
        let out = pack(items.clone(), budget, |s: &String| s.as_str());
        prop_assert!(!out.is_empty());
        prop_assert_eq!(&items[..out.len()], &out[..]);
        let used: usize = out.iter().map(|s| estimate_tokens(s)).sum();
        prop_assert!(out.len() == 1 || used <= budget);
    }
}
