use rfpkb_text::LexicalIndex;

fn corpus() -> Vec<(&'static str, &'static str)> {
    vec![
        ("policy:0", "All customer data is encrypted at rest with AES-256 and in transit with TLS 1.2."),
        ("policy:1", "Our incident response team is on call around the clock."),
        ("hr:0", "The company employs 450 people across three offices."),
        ("hr:1", "Encryption keys are rotated every ninety days by the security team."),
    ]
}

#[test]
fn ranks_documents_sharing_query_terms() {
    let index = LexicalIndex::build(corpus()).expect("build");
    assert_eq!(index.len(), 4);

    let hits = index.search("How is customer data encrypted?", 10).expect("search");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].id, "policy:0");
    for w in hits.windows(2) { assert!(w[0].score >= w[1].score); }
    assert!(hits.iter().all(|h| h.id != "policy:1"), "no shared term, no hit");
}

#[test]
fn one_index_serves_many_queries() {
    let index = LexicalIndex::build(corpus()).expect("build");
    let first = index.search("incident response", 2).expect("search");
    let second = index.search("employees offices", 2).expect("search");
    assert_eq!(first[0].id, "policy:1");
    assert_eq!(second[0].id, "hr:0");
}

#[test]
fn stray_query_syntax_does_not_fail() {
    let index = LexicalIndex::build(corpus()).expect("build");
    let hits = index.search("encryption AND (keys OR \"rotation", 5).expect("lenient search");
    assert!(hits.iter().any(|h| h.id == "hr:1"));
}

#[test]
fn empty_corpus_and_zero_limit_return_nothing() {
    let empty = LexicalIndex::build(Vec::<(&str, &str)>::new()).expect("build");
    assert!(empty.is_empty());
    assert!(empty.search("anything", 5).expect("search").is_empty());

    let index = LexicalIndex::build(corpus()).expect("build");
    assert!(index.search("customer", 0).expect("search").is_empty());
}
