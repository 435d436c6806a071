use async_trait::async_trait;

use super::EmbeddingProvider;
use crate::core::errors::ApiError;
use crate::vector_math::normalize;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Feature-hashing embedder over lower-cased words and padded character trigrams.
///
/// Needs no model download; related wordings ("pulire" / "pulizia") share
/// trigrams and therefore land close together.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_id: format!("hashing-ngram-{}", dimension),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[self.bucket(word.as_bytes())] += WORD_WEIGHT;

            let padded: Vec<char> = std::iter::once(' ')
                .chain(word.chars())
                .chain(std::iter::once(' '))
                .collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                vector[self.bucket(trigram.as_bytes())] += TRIGRAM_WEIGHT;
            }
        }

        normalize(&mut vector);
        vector
    }

    fn bucket(&self, bytes: &[u8]) -> usize {
        (fnv1a(bytes) % self.dimension as u64) as usize
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        Ok(self.embed_sync(text))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes
        .iter()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_math::{cosine_similarity, l2_norm};

    #[test]
    fn output_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed_sync("Pulizia del forno");
        let b = embedder.embed_sync("Pulizia del forno");

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert!((l2_norm(&a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let v = embedder.embed_sync("  ... ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn overlapping_text_scores_higher_than_unrelated() {
        let embedder = HashingEmbedder::new(384);
        let query = embedder.embed_sync("pulizia forno");
        let oven = embedder.embed_sync(
            "Per pulire il forno naturalmente, usa bicarbonato di sodio e aceto.",
        );
        let plants = embedder
            .embed_sync("Le piante d'appartamento come pothos e sansevieria purificano l'aria.");

        assert!(cosine_similarity(&query, &oven) > cosine_similarity(&query, &plants));
    }

    #[test]
    fn case_does_not_matter() {
        let embedder = HashingEmbedder::new(128);
        assert_eq!(embedder.embed_sync("FORNO"), embedder.embed_sync("forno"));
    }
}
