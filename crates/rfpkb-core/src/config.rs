//! Configuration loader, typed engine settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_RETRIEVAL__TOP_K=8`). Provides helpers to expand `~` and `${VAR}` and
//! to resolve relative paths against a known base directory.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Load `config.toml` and the environment overlay from `dir`.
    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(env_name)?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        match env {
            "prod" | "production" => {
                if settings.services.embedding.provider == "hash" {
                    return Err(Error::InvalidConfig(
                        "the hash embedder is for development only; configure services.embedding.provider".into(),
                    )
                    .into());
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub shortcut: ShortcutSettings,
    pub trust: TrustSettings,
    pub resolver: ResolverSettings,
    pub services: ServiceSettings,
    pub storage: StorageSettings,
    pub batch: BatchSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        let r = &self.retrieval;
        if r.top_k == 0 || r.max_sub_queries == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k and retrieval.max_sub_queries must be positive".into()));
        }
        if r.lexical_scale <= 0.0 {
            return Err(Error::InvalidConfig("retrieval.lexical_scale must be positive".into()));
        }
        if self.shortcut.fallback_threshold > self.shortcut.direct_threshold {
            return Err(Error::InvalidConfig("shortcut.fallback_threshold must not exceed shortcut.direct_threshold".into()));
        }
        if self.resolver.max_attempts == 0 {
            return Err(Error::InvalidConfig("resolver.max_attempts must be positive".into()));
        }
        if self.trust.source_bonus.is_empty() {
            return Err(Error::InvalidConfig("trust.source_bonus needs at least one entry".into()));
        }
        if self.batch.concurrency == 0 {
            return Err(Error::InvalidConfig("batch.concurrency must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// Vector and lexical candidates kept per sub-query: `top_k * candidate_multiplier`.
    pub candidate_multiplier: usize,
    /// Fused candidates sent to the reranker: `top_k * fused_multiplier`.
    pub fused_multiplier: usize,
    pub vector_weight: f32,
    pub lexical_weight: f32,
    /// Raw BM25 scores are divided by this before fusion.
    pub lexical_scale: f32,
    pub dedup_prefix_chars: usize,
    pub token_budget: usize,
    pub relevance_floor: f32,
    pub rerank_timeout_ms: u64,
    pub max_sub_queries: usize,
    pub decompose_min_words: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            candidate_multiplier: 3,
            fused_multiplier: 2,
            vector_weight: 0.7,
            lexical_weight: 0.3,
            lexical_scale: 10.0,
            dedup_prefix_chars: 200,
            token_budget: 5_000,
            relevance_floor: 0.05,
            rerank_timeout_ms: 10_000,
            max_sub_queries: 4,
            decompose_min_words: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutSettings {
    /// Above this, answer straight from the attribute and skip retrieval.
    pub direct_threshold: f32,
    /// Above this, use the attribute when retrieval found nothing usable.
    pub fallback_threshold: f32,
    pub top_k: usize,
}

impl Default for ShortcutSettings {
    fn default() -> Self {
        Self { direct_threshold: 0.75, fallback_threshold: 0.5, top_k: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustSettings {
    pub attribute_multiplier: f32,
    pub rag_multiplier: f32,
    pub rag_cap: f32,
    pub length_ceiling_words: usize,
    pub length_points: f32,
    pub keyword_points: f32,
    /// Bonus by number of distinct sources; the last entry applies to any larger count.
    pub source_bonus: Vec<f32>,
    pub rag_consistency_multiplier: f32,
    pub rag_consistency_sources: usize,
    pub consistency_cap: f32,
    pub corroboration_floor: f32,
    pub corroboration_multiplier: f32,
    /// Weight of an external quality judgment when one is available.
    pub quality_judge_weight: f32,
}

impl Default for TrustSettings {
    fn default() -> Self {
        Self {
            attribute_multiplier: 60.0,
            rag_multiplier: 150.0,
            rag_cap: 60.0,
            length_ceiling_words: 50,
            length_points: 10.0,
            keyword_points: 10.0,
            source_bonus: vec![0.0, 3.0, 6.0, 10.0],
            rag_consistency_multiplier: 20.0,
            rag_consistency_sources: 3,
            consistency_cap: 10.0,
            corroboration_floor: 0.5,
            corroboration_multiplier: 10.0,
            quality_judge_weight: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub key_weight: f32,
    pub value_weight: f32,
    pub category_weight: f32,
    /// Minimum key similarity before a pair is considered at all.
    pub key_gate: f32,
    /// Minimum weighted score for a match to become a conflict.
    pub accept_threshold: f32,
    /// Key similarity at or above which two attributes name the same fact.
    pub same_key: f32,
    pub duplicate_value: f32,
    pub similar_key: f32,
    /// Attempts per batch when a concurrent writer invalidates the plan.
    pub max_attempts: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            key_weight: 0.6,
            value_weight: 0.3,
            category_weight: 0.1,
            key_gate: 0.75,
            accept_threshold: 0.7,
            same_key: 0.95,
            duplicate_value: 0.9,
            similar_key: 0.85,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// `hash` (deterministic, offline) or `http` (OpenAI-compatible endpoint).
    pub provider: String,
    pub dim: usize,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "hash".to_string(),
            dim: 1536,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteServiceSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for RemoteServiceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            model: String::new(),
            api_key_env: String::new(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub embedding: EmbeddingSettings,
    pub reranker: RemoteServiceSettings,
    pub generator: RemoteServiceSettings,
    pub judge: RemoteServiceSettings,
    /// Layer the judge's answer-quality score over the formulaic trust score.
    pub quality_judge: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            embedding: EmbeddingSettings::default(),
            reranker: RemoteServiceSettings {
                enabled: false,
                base_url: "https://api.cohere.com/v1".to_string(),
                model: "rerank-english-v3.0".to_string(),
                api_key_env: "COHERE_API_KEY".to_string(),
                timeout_secs: 10,
            },
            generator: RemoteServiceSettings {
                enabled: true,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                timeout_secs: 120,
            },
            judge: RemoteServiceSettings {
                enabled: true,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                timeout_secs: 60,
            },
            quality_judge: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub lancedb_dir: String,
    pub chunk_table: String,
    pub sqlite_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            lancedb_dir: "~/.rfpkb/lancedb".to_string(),
            chunk_table: "chunks".to_string(),
            sqlite_path: "~/.rfpkb/facts.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub concurrency: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { concurrency: 5 }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
