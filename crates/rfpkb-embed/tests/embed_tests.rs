use rfpkb_core::config::EmbeddingSettings;
use rfpkb_core::similarity::cosine_similarity;
use rfpkb_core::traits::Embedder;
use rfpkb_embed::{get_default_embedder, HashEmbedder};

#[tokio::test]
async fn hash_embedder_is_deterministic_and_normalized() {
    let e = HashEmbedder::new(64);
    let a = e.embed("We hold SOC 2 Type II certification").await.unwrap();
    let b = e.embed("We hold SOC 2 Type II certification").await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn shared_words_score_higher_than_disjoint_text() {
    let e = HashEmbedder::new(256);
    let vs = e
        .embed_batch(&[
            "soc 2 certification".to_string(),
            "Do you have SOC 2 certification?".to_string(),
            "lunch menu tuesday".to_string(),
        ])
        .await
        .unwrap();
    assert!(cosine_similarity(&vs[0], &vs[1]) > cosine_similarity(&vs[0], &vs[2]));
}

#[tokio::test]
async fn blank_text_embeds_to_zero_vector() {
    let e = HashEmbedder::new(8);
    let v = e.embed("   ").await.unwrap();
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn factory_honours_provider_setting() {
    let settings = EmbeddingSettings { provider: "hash".into(), dim: 32, ..EmbeddingSettings::default() };
    let embedder = get_default_embedder(&settings).unwrap();
    assert_eq!(embedder.dim(), 32);

    let unknown = EmbeddingSettings { provider: "carrier-pigeon".into(), ..EmbeddingSettings::default() };
    if std::env::var("APP_USE_FAKE_EMBEDDINGS").is_err() {
        assert!(get_default_embedder(&unknown).is_err());
    }
}

struct FailingEmbedder;

#[async_trait::async_trait]
impl Embedder for FailingEmbedder {
    fn dim(&self) -> usize { 8 }

    async fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding endpoint returned 503")
    }
}

fn chunks(n: usize) -> Vec<rfpkb_core::types::Chunk> {
    let tenant = rfpkb_core::types::TenantId::new("acme").unwrap();
    rfpkb_core::data_processor::DataProcessor::new()
        .chunk_document(&tenant, "handbook", &(0..n).map(|i| format!("Paragraph number {}.", i)).collect::<Vec<_>>().join("\n\n"))
}

#[tokio::test]
async fn embed_chunks_fills_every_chunk_in_batches() {
    let mut cs = chunks(5);
    assert_eq!(cs.len(), 5);
    let mut progress = Vec::new();
    rfpkb_embed::embed_chunks(&HashEmbedder::new(16), &mut cs, 2, |n| progress.push(n)).await.unwrap();
    assert_eq!(progress, vec![2, 4, 5]);
    assert!(cs.iter().all(|c| c.embedding.as_ref().map(Vec::len) == Some(16)));
}

#[tokio::test]
async fn embed_chunks_failure_is_an_embedding_error() {
    let mut cs = chunks(3);
    let err = rfpkb_embed::embed_chunks(&FailingEmbedder, &mut cs, 8, |_| {}).await.unwrap_err();
    assert!(matches!(err, rfpkb_core::error::Error::Embedding(_)));
    assert!(cs.iter().all(|c| c.embedding.is_none()));
}
