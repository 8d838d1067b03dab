//! Text embeddings and vector similarity.

use crate::metrics::Usage;
use sha2::{Digest, Sha256};

pub type Vector = Vec<f32>;

/// Turns text into fixed-size vectors.
pub trait Embedder: Send + Sync {
    fn model(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Vector;

    /// Embedding plus the token usage the provider reported, if any.
    fn embed_with_usage(&self, text: &str) -> (Vector, Option<Usage>) {
        (self.embed(text), None)
    }
}

/// Literal hash embedding: the SHA-256 digest of the text, one float per
/// byte scaled into `[0, 1]`.
///
/// Identical texts map to identical vectors. Nothing else about the
/// geometry is meaningful, so it is only suited to exact-match lookups and
/// tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub const MODEL: &'static str = "literal_hash_emb";
    pub const DIMENSIONS: usize = 32;
}

impl Embedder for HashEmbedder {
    fn model(&self) -> &str {
        Self::MODEL
    }

    fn dimensions(&self) -> usize {
        Self::DIMENSIONS
    }

    fn embed(&self, text: &str) -> Vector {
        Sha256::digest(text.as_bytes())
            .iter()
            .map(|b| f32::from(*b) / 255.0)
            .collect()
    }
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; `None` when the dimensions differ. Zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let (mag_a, mag_b) = (magnitude(a), magnitude(b));
    if mag_a == 0.0 || mag_b == 0.0 {
        return Some(0.0);
    }
    Some(dot / (mag_a * mag_b))
}
