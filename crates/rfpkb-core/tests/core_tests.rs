use std::fs;
use std::io::Write;
use tempfile::TempDir;

use rfpkb_core::data_processor::{estimate_tokens, ChunkingConfig, DataProcessor};
use rfpkb_core::types::TenantId;

fn tenant() -> TenantId {
    TenantId::new("acme").unwrap()
}

#[test]
fn process_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("security-policy.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let processor = DataProcessor::new();
    let chunks = processor.process_directory(&tenant(), dir).expect("process");

    assert_eq!(chunks.len(), 1, "one small paragraph becomes one chunk");
    assert_eq!(chunks[0].text, "Short text");
    assert_eq!(chunks[0].document_id, "security-policy");
    assert_eq!(chunks[0].id, "security-policy:0");
    assert_eq!(chunks[0].tenant_id, tenant());
    assert!(chunks[0].embedding.is_none());
}

#[test]
fn paragraphs_become_separate_chunks_with_char_count() {
    let processor = DataProcessor::new();
    let chunks = processor.chunk_document(&tenant(), "doc", "alpha bravo\n\n\n\ncharlie delta echo\n\n   ");
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[1].chunk_index, 1);
    assert_eq!(chunks[1].metadata.get("char_count").map(String::as_str), Some("18"));
}

#[test]
fn long_paragraph_is_split_with_overlap() {
    let processor = DataProcessor::with_config(ChunkingConfig { max_tokens: 10, overlap_percent: 0.2, words_per_chunk: 10 });
    let paragraph: Vec<String> = (0..25).map(|i| format!("w{}", i)).collect();
    let chunks = processor.chunk_document(&tenant(), "doc", &paragraph.join(" "));

    assert_eq!(chunks.len(), 3);
    assert!(chunks[0].text.starts_with("w0 "));
    // two words of overlap between consecutive windows
    assert!(chunks[1].text.starts_with("w8 w9 w10"));
    assert!(chunks[2].text.ends_with("w24"));
}

#[test]
fn token_estimate_is_deterministic_and_word_based() {
    assert_eq!(estimate_tokens(""), 0);
    assert_eq!(estimate_tokens("one two three"), 4);
    let text = "the quick brown fox jumps over the lazy dog";
    assert_eq!(estimate_tokens(text), estimate_tokens(text));
}

#[test]
fn tenant_id_rejects_blank() {
    assert!(TenantId::new("   ").is_err());
    assert_eq!(TenantId::new(" acme ").unwrap().as_str(), "acme");
    assert!(serde_json::from_str::<TenantId>("\"\"").is_err());
}

#[test]
fn strip_code_fence_accepts_bare_and_fenced_json() {
    use rfpkb_core::traits::strip_code_fence;
    assert_eq!(strip_code_fence(" {\"a\":1} "), "{\"a\":1}");
    assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    assert_eq!(strip_code_fence("```\n{\"a\":1}```"), "{\"a\":1}");
}
