use serde::Serialize;

use rfpkb_core::similarity::cosine_similarity;
use rfpkb_core::traits::Embedder;
use rfpkb_core::types::Attribute;

#[derive(Debug, Clone, Serialize)]
pub struct AttributeMatch {
    pub attribute: Attribute,
    pub similarity: f32,
}

pub fn attribute_text(attribute: &Attribute) -> String {
    format!("{}: {}", attribute.key, attribute.value)
}

/// The `top_k` attributes closest to `question` by embedding cosine,
/// best first. Ties keep store order.
pub async fn rank_attributes(
    embedder: &dyn Embedder,
    question: &str,
    attributes: &[Attribute],
    top_k: usize,
) -> anyhow::Result<Vec<AttributeMatch>> {
    if attributes.is_empty() || top_k == 0 {
        return Ok(vec![]);
    }
    let mut texts = Vec::with_capacity(attributes.len() + 1);
    texts.push(question.to_string());
    texts.extend(attributes.iter().map(attribute_text));
    let vectors = embedder.embed_batch(&texts).await?;
    if vectors.len() != texts.len() {
        anyhow::bail!("embedder returned {} vectors for {} texts", vectors.len(), texts.len());
    }
    let query = &vectors[0];
    let mut matches: Vec<AttributeMatch> = attributes
        .iter()
        .zip(&vectors[1..])
        .map(|(attribute, v)| AttributeMatch { attribute: attribute.clone(), similarity: cosine_similarity(query, v) })
        .collect();
    matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
    matches.truncate(top_k);
    Ok(matches)
}
