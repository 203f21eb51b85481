use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::errors::ApplicationError;

pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ApplicationError>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ApplicationError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Local embedding model: feature-hashed term weights plus bigrams, L2 normalized.
/// Identical text always maps to the identical vector.
#[derive(Clone, Debug)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSIONS: usize = 384;

    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(String::from)
            .collect()
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() % self.dimensions as u64) as usize
    }

    fn sign(token: &str) -> f32 {
        let mut hasher = DefaultHasher::new();
        (token, "sign").hash(&mut hasher);
        if hasher.finish() % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ApplicationError> {
        let tokens = Self::tokenize(text);
        let mut vector = vec![0.0_f32; self.dimensions];
        if tokens.is_empty() {
            return Ok(vector);
        }

        let mut term_counts: HashMap<&str, f32> = HashMap::new();
        for token in &tokens {
            *term_counts.entry(token.as_str()).or_insert(0.0) += 1.0;
        }

        let doc_len = tokens.len() as f32;
        for (token, count) in term_counts {
            let tf = (1.0 + count / doc_len).ln();
            // longer tokens tend to be rarer
            let idf = 1.0 + token.len() as f32 * 0.1;
            vector[self.bucket(token)] += tf * idf * Self::sign(token);
        }

        for pair in tokens.windows(2) {
            let bigram = format!("{}_{}", pair[0], pair[1]);
            vector[self.bucket(&bigram)] += 0.5 * Self::sign(&bigram);
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "hashing-tfidf"
    }
}

/// Cosine similarity in [-1, 1]; zero-length, mismatched or zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::{cosine_similarity, Embedder, HashingEmbedder};

    #[test]
    fn cosine_similarity_bounds() {
        let a = [1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &[1.0, 0.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_similarity(&a, &[-2.0, 0.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn same_text_embeds_identically() -> Result<(), String> {
        let embedder = HashingEmbedder::new(128);
        let first = embedder.embed("Size: M Color: black").map_err(|e| e.to_string())?;
        let second = embedder.embed("Size: M Color: black").map_err(|e| e.to_string())?;
        assert_eq!(first, second);
        assert_eq!(first.len(), 128);
        Ok(())
    }

    #[test]
    fn empty_text_is_the_zero_vector() -> Result<(), String> {
        let embedder = HashingEmbedder::new(64);
        let vector = embedder.embed("").map_err(|e| e.to_string())?;
        assert!(vector.iter().all(|value| *value == 0.0));
        Ok(())
    }

    #[test]
    fn overlapping_text_scores_higher() -> Result<(), String> {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("black running shoes size m").map_err(|e| e.to_string())?;
        let close = embedder.embed("black running shoes").map_err(|e| e.to_string())?;
        let far = embedder.embed("stainless steel kettle").map_err(|e| e.to_string())?;

        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
        Ok(())
    }

    #[test]
    fn embeddings_are_unit_length() -> Result<(), String> {
        let embedder = HashingEmbedder::default();
        let vector =
            embedder.embed("waterproof hiking jacket with hood").map_err(|e| e.to_string())?;
        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
        Ok(())
    }
}
