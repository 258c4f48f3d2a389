//! HTTP clients for the hosted reranker and the chat-completions model that
//! backs both answer generation and judgment calls.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use rfpkb_core::config::RemoteServiceSettings;
use rfpkb_core::traits::{Generator, Judge, Reranker};
use rfpkb_core::types::RerankHit;

fn client(settings: &RemoteServiceSettings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .context("building http client")
}

fn api_key(settings: &RemoteServiceSettings) -> Option<String> {
    if settings.api_key_env.is_empty() {
        return None;
    }
    std::env::var(&settings.api_key_env).ok()
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

/// Cohere-style `/rerank` client.
pub struct HttpReranker {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpReranker {
    pub fn new(settings: &RemoteServiceSettings) -> Result<Self> {
        Ok(Self {
            client: client(settings)?,
            endpoint: format!("{}/rerank", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            api_key: api_key(settings),
        })
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<RerankHit>> {
        if documents.is_empty() {
            return Ok(vec![]);
        }
        let mut request = self.client.post(&self.endpoint).json(&RerankRequest { model: &self.model, query, documents });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.context("rerank request failed")?.error_for_status()?;
        let body: RerankResponse = response.json().await.context("decoding rerank response")?;
        debug!(documents = documents.len(), results = body.results.len(), "rerank response");
        Ok(body.results.into_iter().map(|r| RerankHit { index: r.index, relevance: r.relevance_score }).collect())
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ChatModel {
    pub fn new(settings: &RemoteServiceSettings) -> Result<Self> {
        Ok(Self {
            client: client(settings)?,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            api_key: api_key(settings),
        })
    }

    async fn complete(&self, messages: Vec<ChatMessage<'_>>, temperature: f32, json: bool) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature,
            response_format: json.then_some(ResponseFormat { kind: "json_object" }),
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.context("chat request failed")?.error_for_status()?;
        let reply: ChatResponse = response.json().await.context("decoding chat response")?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("chat response had no content"))?;
        debug!(model = %self.model, chars = content.len(), "chat completion");
        Ok(content)
    }
}

#[async_trait]
impl Generator for ChatModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let text = self.complete(vec![ChatMessage { role: "user", content: prompt }], 0.2, false).await?;
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl Judge for ChatModel {
    async fn judge(&self, system: &str, prompt: &str) -> Result<String> {
        let messages = vec![ChatMessage { role: "system", content: system }, ChatMessage { role: "user", content: prompt }];
        self.complete(messages, 0.0, true).await
    }
}
