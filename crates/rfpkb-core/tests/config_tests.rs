use std::fs;
use tempfile::TempDir;

use rfpkb_core::config::{resolve_with_base, Config};

#[test]
fn defaults_apply_without_files() {
    let tmp = TempDir::new().unwrap();
    let config = Config::load_from(tmp.path(), "test").expect("load");
    let settings = config.settings().expect("settings");
    assert_eq!(settings.retrieval.top_k, 5);
    assert_eq!(settings.retrieval.token_budget, 5_000);
    assert!((settings.retrieval.relevance_floor - 0.05).abs() < 1e-6);
    assert!((settings.shortcut.direct_threshold - 0.75).abs() < 1e-6);
    assert_eq!(settings.batch.concurrency, 5);
}

#[test]
fn env_overlay_wins_over_base_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[retrieval]\ntop_k = 8\ntoken_budget = 4000\n").unwrap();
    fs::write(tmp.path().join("config.test.toml"), "[retrieval]\ntop_k = 3\n").unwrap();

    let config = Config::load_from(tmp.path(), "test").expect("load");
    let settings = config.settings().expect("settings");
    assert_eq!(settings.retrieval.top_k, 3);
    assert_eq!(settings.retrieval.token_budget, 4000);
    assert_eq!(config.get::<usize>("retrieval.top_k").unwrap(), 3);
}

#[test]
fn prod_rejects_hash_embedder() {
    let tmp = TempDir::new().unwrap();
    assert!(Config::load_from(tmp.path(), "prod").is_err());
    fs::write(tmp.path().join("config.prod.toml"), "[services.embedding]\nprovider = \"http\"\n").unwrap();
    assert!(Config::load_from(tmp.path(), "prod").is_ok());
}

#[test]
fn invalid_thresholds_are_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[shortcut]\ndirect_threshold = 0.4\nfallback_threshold = 0.6\n").unwrap();
    assert!(Config::load_from(tmp.path(), "dev").is_err());
}

#[test]
fn relative_paths_resolve_against_base() {
    let base = std::path::Path::new("/srv/rfpkb");
    assert_eq!(resolve_with_base(base, "data/facts.db"), base.join("data/facts.db"));
    assert_eq!(resolve_with_base(base, "/var/lib/facts.db"), std::path::PathBuf::from("/var/lib/facts.db"));
}
