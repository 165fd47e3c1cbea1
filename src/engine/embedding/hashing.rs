// ── Embeddings: Feature-Hashing Model ──────────────────────────────────────
//
// Offline, deterministic bag-of-words embedder. Each lowercase alphanumeric
// token is hashed (SHA-256) into one of `dimension` buckets with a ±1 sign,
// then the vector is L2-normalized. Texts sharing words land close together,
// which is all the graph search needs when no model server is available.

use super::LocalEmbedder;
use crate::atoms::error::EngineResult;
use sha2::{Digest, Sha256};

pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
            ]) % self.dimension as u64;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket as usize] += sign;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 1e-8 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

impl LocalEmbedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing-v1"
    }

    fn embed_blocking(&self, text: &str) -> EngineResult<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::store::cosine_distance;

    #[test]
    fn deterministic_and_normalized() {
        let e = HashingEmbedder::new(64);
        let a = e.embed_text("I met Alice in Paris");
        let b = e.embed_text("I met Alice in Paris");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn case_and_punctuation_insensitive() {
        let e = HashingEmbedder::new(64);
        assert_eq!(e.embed_text("Paris!"), e.embed_text("paris"));
    }

    #[test]
    fn shared_words_are_closer() {
        let e = HashingEmbedder::new(256);
        let q = e.embed_text("Paris");
        let related = e.embed_text("I met Alice in Paris");
        let unrelated = e.embed_text("quarterly budget review");
        assert!(cosine_distance(&q, &related) < cosine_distance(&q, &unrelated));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(8);
        assert!(e.embed_text("  ...  ").iter().all(|x| *x == 0.0));
    }
}
