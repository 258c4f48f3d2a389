//! Embedding providers behind `rfpkb_core::traits::Embedder`.
//!
//! `HttpEmbedder` talks to an OpenAI-compatible `/embeddings` endpoint.
//! `HashEmbedder` is deterministic and offline, for tests and local runs.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use rfpkb_core::config::EmbeddingSettings;
use rfpkb_core::error::Error;
use rfpkb_core::traits::Embedder;
use rfpkb_core::types::Chunk;

/// Token-hashing embedder. The same text always yields the same unit vector;
/// texts sharing words land close together.
pub struct HashEmbedder { dim: usize }

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() { continue; }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            v[idx] += 0.5 + ((h >> 32) as u32) as f32 / (u32::MAX as f32);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// OpenAI-compatible embedding client.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dim: usize,
}

impl HttpEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building embedding http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            api_key: std::env::var(&settings.api_key_env).ok(),
            dim: settings.dim,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dim(&self) -> usize { self.dim }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(vec![]); }
        let mut request = self.client.post(&self.endpoint).json(&EmbedRequest { model: &self.model, input: texts });
        if let Some(key) = &self.api_key { request = request.bearer_auth(key); }
        let response = request.send().await.context("embedding request failed")?.error_for_status()?;
        let body: EmbedResponse = response.json().await.context("decoding embedding response")?;
        debug!(inputs = texts.len(), vectors = body.data.len(), "embedding response");

        let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for (pos, item) in body.data.into_iter().enumerate() {
            let slot = item.index.unwrap_or(pos);
            if slot >= out.len() { return Err(anyhow!("embedding index {} out of range", slot)); }
            if item.embedding.len() != self.dim {
                return Err(anyhow!("embedding dimension {} != configured {}", item.embedding.len(), self.dim));
            }
            out[slot] = Some(item.embedding);
        }
        out.into_iter()
            .enumerate()
            .map(|(i, v)| v.ok_or_else(|| anyhow!("no embedding returned for input {}", i)))
            .collect()
    }
}

/// Picks the provider named in settings. `APP_USE_FAKE_EMBEDDINGS=1` forces
/// the hash embedder regardless.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake || settings.provider == "hash" {
        info!(dim = settings.dim, "using hash embedder");
        return Ok(Arc::new(HashEmbedder::new(settings.dim)));
    }
    match settings.provider.as_str() {
        "openai" | "http" => {
            info!(model = %settings.model, "using http embedder");
            Ok(Arc::new(HttpEmbedder::new(settings)?))
        }
        other => Err(anyhow!("unknown embedding provider: {}", other)),
    }
}

/// Fill in `chunk.embedding` for every chunk, `batch_size` texts per call.
/// `on_batch` receives the number of chunks embedded so far. Any failure,
/// including a vector of the wrong dimension, aborts with `Error::Embedding`.
pub async fn embed_chunks<F>(
    embedder: &dyn Embedder,
    chunks: &mut [Chunk],
    batch_size: usize,
    mut on_batch: F,
) -> rfpkb_core::error::Result<()>
where
    F: FnMut(usize),
{
    let mut done = 0;
    for window in chunks.chunks_mut(batch_size.max(1)) {
        let texts: Vec<String> = window.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await.map_err(Error::Embedding)?;
        if vectors.len() != window.len() {
            return Err(Error::Embedding(anyhow!("embedder returned {} vectors for {} chunks", vectors.len(), window.len())));
        }
        for (chunk, vector) in window.iter_mut().zip(vectors) {
            if vector.len() != embedder.dim() {
                return Err(Error::Embedding(anyhow!("chunk {} embedded with dimension {} != {}", chunk.id, vector.len(), embedder.dim())));
            }
            chunk.embedding = Some(vector);
        }
        done += window.len();
        on_batch(done);
    }
    debug!(chunks = done, "embedded chunks");
    Ok(())
}
