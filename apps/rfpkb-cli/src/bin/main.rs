//! rfpkb - operator CLI for the RFP knowledge engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use rfpkb_answer::{ChatModel, HttpReranker, KnowledgeEngine, Services};
use rfpkb_core::config::{resolve_with_base, Config, Settings};
use rfpkb_core::data_processor::DataProcessor;
use rfpkb_core::traits::{AttributeStore, ChunkStore, Embedder, Judge, Reranker};
use rfpkb_core::types::{AnswerEnvelope, NewAttribute, TenantId};
use rfpkb_embed::{embed_chunks, get_default_embedder};
use rfpkb_facts::{ConflictResolver, KnowledgeWriter, SqliteFactStore};
use rfpkb_vector::LanceChunkStore;

const EMBED_BATCH: usize = 64;

#[derive(Parser)]
#[command(name = "rfpkb")]
#[command(version, about = "Tenant-scoped knowledge engine for answering RFP questionnaires", long_about = None)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and store every .txt file in a directory
    Ingest { tenant: String, dir: PathBuf },

    /// Remove one document's chunks
    Forget { tenant: String, document: String },

    /// Reconcile a JSON array of extracted facts into the store
    Facts { tenant: String, batch: PathBuf },

    /// Clear a tenant's facts and rebuild them from batch files, in order
    Resync {
        tenant: String,
        #[arg(required = true)]
        batches: Vec<PathBuf>,
    },

    /// Answer one question
    Ask { tenant: String, question: String },

    /// Answer every non-empty line of a file
    AnswerBatch { tenant: String, questions: PathBuf },
}

#[derive(Serialize)]
struct BatchLine {
    question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<AnswerEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_batch(path: &Path) -> Result<Vec<NewAttribute>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing attribute batch {}", path.display()))
}

async fn open_chunks(settings: &Settings, base: &Path) -> Result<LanceChunkStore> {
    let dir = resolve_with_base(base, &settings.storage.lancedb_dir);
    std::fs::create_dir_all(&dir)?;
    Ok(LanceChunkStore::open(&dir, &settings.storage.chunk_table, settings.services.embedding.dim).await?)
}

async fn open_facts(settings: &Settings, base: &Path) -> Result<SqliteFactStore> {
    Ok(SqliteFactStore::open(&resolve_with_base(base, &settings.storage.sqlite_path)).await?)
}

fn judge(settings: &Settings) -> Result<Option<Arc<dyn Judge>>> {
    if !settings.services.judge.enabled {
        return Ok(None);
    }
    Ok(Some(Arc::new(ChatModel::new(&settings.services.judge)?)))
}

fn writer(settings: &Settings, store: SqliteFactStore) -> Result<KnowledgeWriter> {
    let resolver = ConflictResolver::new(settings.resolver.clone(), judge(settings)?);
    Ok(KnowledgeWriter::new(Arc::new(store), resolver))
}

async fn engine(settings: &Settings, base: &Path) -> Result<KnowledgeEngine> {
    let reranker: Option<Arc<dyn Reranker>> = if settings.services.reranker.enabled {
        Some(Arc::new(HttpReranker::new(&settings.services.reranker)?))
    } else {
        None
    };
    let chunks: Arc<dyn ChunkStore> = Arc::new(open_chunks(settings, base).await?);
    let attributes: Arc<dyn AttributeStore> = Arc::new(open_facts(settings, base).await?);
    let services = Services {
        embedder: get_default_embedder(&settings.services.embedding)?,
        reranker,
        generator: Arc::new(ChatModel::new(&settings.services.generator)?),
        quality_judge: if settings.services.quality_judge { judge(settings)? } else { None },
        chunks,
        attributes,
    };
    Ok(KnowledgeEngine::new(services, settings.clone()))
}

async fn ingest(settings: &Settings, base: &Path, tenant: &TenantId, dir: &Path) -> Result<()> {
    let mut chunks = DataProcessor::new().process_directory(tenant, dir)?;
    let embedder: Arc<dyn Embedder> = get_default_embedder(&settings.services.embedding)?;

    let bar = ProgressBar::new(chunks.len() as u64);
    bar.set_style(ProgressStyle::with_template("{spinner} embedding [{bar:40}] {pos}/{len} chunks")?.progress_chars("=> "));
    embed_chunks(embedder.as_ref(), &mut chunks, EMBED_BATCH, |done| bar.set_position(done as u64)).await?;
    bar.finish_and_clear();

    let store = open_chunks(settings, base).await?;
    let stored = store.insert_chunks(tenant, &chunks).await?;
    info!(tenant = %tenant, stored, "ingest complete");
    print_json(&serde_json::json!({ "tenant": tenant.as_str(), "chunks": stored }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let env_name = std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    let settings = Config::load_from(&cli.config_dir, &env_name)?.settings()?;
    let base = cli.config_dir.as_path();

    match cli.command {
        Commands::Ingest { tenant, dir } => ingest(&settings, base, &TenantId::new(tenant)?, &dir).await?,
        Commands::Forget { tenant, document } => {
            let tenant = TenantId::new(tenant)?;
            let removed = open_chunks(&settings, base).await?.delete_document(&tenant, &document).await?;
            print_json(&serde_json::json!({ "tenant": tenant.as_str(), "document": document, "removed": removed }))?;
        }
        Commands::Facts { tenant, batch } => {
            let tenant = TenantId::new(tenant)?;
            let report = writer(&settings, open_facts(&settings, base).await?)?.ingest(&tenant, &read_batch(&batch)?).await?;
            print_json(&report)?;
        }
        Commands::Resync { tenant, batches } => {
            let tenant = TenantId::new(tenant)?;
            let batches = batches.iter().map(|p| read_batch(p)).collect::<Result<Vec<_>>>()?;
            let summary = writer(&settings, open_facts(&settings, base).await?)?.resync(&tenant, &batches).await?;
            print_json(&summary)?;
        }
        Commands::Ask { tenant, question } => {
            let envelope = engine(&settings, base).await?.answer(&tenant, &question).await?;
            print_json(&envelope)?;
        }
        Commands::AnswerBatch { tenant, questions } => {
            let raw = std::fs::read_to_string(&questions).with_context(|| format!("reading {}", questions.display()))?;
            let questions: Vec<String> = raw.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect();
            let results = engine(&settings, base).await?.answer_batch(&tenant, &questions).await;
            let lines: Vec<BatchLine> = questions
                .into_iter()
                .zip(results)
                .map(|(question, result)| match result {
                    Ok(answer) => BatchLine { question, answer: Some(answer), error: None },
                    Err(e) => BatchLine { question, answer: None, error: Some(e.to_string()) },
                })
                .collect();
            print_json(&lines)?;
        }
    }
    Ok(())
}
