use crate::domain::ports::Embedder;
use crate::utils::error::{Result, ServiceError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// Deterministic bag-of-features embedder.
///
/// Lower-cased word tokens and their character trigrams are hashed into a
/// fixed number of signed buckets and the vector is L2-normalised. Texts
/// sharing words or word fragments land close together, which is enough
/// for matching country names and running the test suite without a model
/// server. Product descriptions need a semantic model (see [`TeiEmbedder`]).
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    const TOKEN_WEIGHT: f32 = 1.0;
    const TRIGRAM_WEIGHT: f32 = 0.5;

    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fxhash::hash64(feature);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            self.add_feature(&mut vector, token, Self::TOKEN_WEIGHT);

            let padded: Vec<char> = format!(" {} ", token).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, &trigram, Self::TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
    truncate: bool,
}

/// Client for a Hugging Face text-embeddings-inference server
/// (e.g. serving `sentence-transformers/all-MiniLM-L6-v2`).
#[derive(Debug, Clone)]
pub struct TeiEmbedder {
    client: Client,
    endpoint: String,
    dimension: usize,
}

impl TeiEmbedder {
    /// TEI's default `--max-client-batch-size`.
    const MAX_BATCH: usize = 32;

    pub fn new(client: Client, endpoint: impl Into<String>, dimension: usize) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for TeiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(Self::MAX_BATCH) {
            tracing::debug!("Embedding {} texts via {}", batch.len(), self.endpoint);
            let response = self
                .client
                .post(&self.endpoint)
                .json(&EmbedRequest {
                    inputs: batch,
                    truncate: true,
                })
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(ServiceError::UpstreamStatusError {
                    url: self.endpoint.clone(),
                    status: response.status().as_u16(),
                });
            }

            let batch_vectors: Vec<Vec<f32>> = response.json().await?;
            if let Some(bad) = batch_vectors.iter().find(|v| v.len() != self.dimension) {
                return Err(ServiceError::EmbeddingError {
                    message: format!(
                        "server returned {}-dimensional vectors, expected {}",
                        bad.len(),
                        self.dimension
                    ),
                });
            }
            vectors.extend(batch_vectors);
        }

        Ok(vectors)
    }
}
