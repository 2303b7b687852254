// ============================================================
// Layer 4 — Hashing Sentence Embedder
// ============================================================
// The classifier expects a fixed-size sentence vector from an
// embedding provider. This embedder produces one locally with
// the hashing trick:
//
//   - lower-case the text and split on non-alphanumerics
//   - hash every unigram and bigram with FNV-1a
//   - bucket = hash % dim, sign = one hash bit
//   - accumulate ±1 per feature, then L2-normalise
//
// The signed buckets keep collisions from biasing every
// dimension upward. FNV-1a is used instead of the std hasher
// because the vectors must be identical between the training
// run and any later prediction run.

use crate::domain::traits::TextEmbedder;

pub const DEFAULT_EMBEDDING_DIM: usize = 512;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn add_feature(&self, feature: &str, vector: &mut [f32]) {
        let hash   = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dim as u64) as usize;
        let sign   = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

impl TextEmbedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut vector = vec![0.0f32; self.dim];
        for word in &words {
            self.add_feature(word, &mut vector);
        }
        for pair in words.windows(2) {
            self.add_feature(&format!("{} {}", pair[0], pair[1]), &mut vector);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

/// 64-bit FNV-1a.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME:  u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET, |hash, &b| (hash ^ b as u64).wrapping_mul(PRIME))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_has_requested_dim_and_unit_norm() {
        let e = HashingEmbedder::new(64);
        let v = e.embed("The quick brown fox");
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_embedding_is_deterministic_and_case_insensitive() {
        let e = HashingEmbedder::default();
        assert_eq!(e.embed("Hello World"), e.embed("hello world"));
    }

    #[test]
    fn test_empty_text_gives_zero_vector() {
        let e = HashingEmbedder::new(8);
        assert_eq!(e.embed("  ... "), vec![0.0; 8]);
    }

    #[test]
    fn test_fnv_reference_values() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_embed_batch_matches_single() {
        let e     = HashingEmbedder::new(16);
        let texts = vec!["one".to_string(), "two words".to_string()];
        let batch = e.embed_batch(&texts);
        assert_eq!(batch[1], e.embed("two words"));
    }
}
