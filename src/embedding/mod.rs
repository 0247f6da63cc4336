// Word-embedding table and vector math for tool-trigger classification
//
// The table maps lower-cased words to fixed-dimension vectors. Phrases are
// resolved by whole-string lookup first, then by averaging the vectors of
// whatever tokens resolve. A phrase with zero resolvable tokens is a normal
// "unknown" outcome, not an error.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub mod prototypes;

pub use prototypes::{ExemplarSet, PrototypeStore};

/// Pretrained word-embedding lookup table.
pub struct EmbeddingTable {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl EmbeddingTable {
    /// An empty table with a fixed dimension. Every lookup misses, so
    /// trigger evaluation fails open to plain conversation.
    pub fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
        }
    }

    /// Build a table from (word, vector) pairs. All vectors must share one
    /// dimension. Words are stored lower-cased.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        let mut dimension = 0usize;
        let mut vectors = HashMap::new();

        for (word, vector) in pairs {
            if dimension == 0 {
                dimension = vector.len();
            } else if vector.len() != dimension {
                anyhow::bail!(
                    "inconsistent embedding dimension: expected {}, got {}",
                    dimension,
                    vector.len()
                );
            }
            vectors.insert(word.into().to_lowercase(), vector);
        }

        if dimension == 0 {
            anyhow::bail!("embedding table has no entries");
        }

        Ok(Self { dimension, vectors })
    }

    /// Load a GloVe-style text file: one `word v1 v2 ... vN` entry per line.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open embedding table: {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut dimension = 0usize;
        let mut vectors = HashMap::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.context("failed to read embedding table line")?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut parts = line.split_whitespace();
            let word = parts
                .next()
                .with_context(|| format!("malformed embedding entry at line {}", line_no + 1))?;
            let vector: Vec<f32> = parts
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("malformed embedding values at line {}", line_no + 1))?;

            if dimension == 0 {
                dimension = vector.len();
            } else if vector.len() != dimension {
                anyhow::bail!(
                    "inconsistent embedding dimension at line {}: expected {}, got {}",
                    line_no + 1,
                    dimension,
                    vector.len()
                );
            }

            vectors.insert(word.to_lowercase(), vector);
        }

        if vectors.is_empty() {
            anyhow::bail!("embedding table is empty: {}", path.display());
        }

        tracing::info!(
            words = vectors.len(),
            dimension,
            "loaded embedding table from {}",
            path.display()
        );

        Ok(Self { dimension, vectors })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Vectorize text: whole lower-cased string first, then the mean of all
    /// resolvable whitespace tokens. `None` when nothing resolves.
    pub fn vector(&self, text: &str) -> Option<Vec<f32>> {
        let normalized = text.to_lowercase();

        if let Some(vector) = self.vectors.get(normalized.trim()) {
            return Some(vector.clone());
        }

        let token_vectors: Vec<&Vec<f32>> = normalized
            .split_whitespace()
            .filter_map(|token| self.vectors.get(token))
            .collect();

        if token_vectors.is_empty() {
            tracing::debug!("no embedding coverage for {:?}", text);
            return None;
        }

        Some(mean_of(&token_vectors))
    }
}

/// Cosine similarity between two vectors. Defined as 0.0 when either
/// magnitude is zero or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Elementwise mean of a set of vectors. `None` when the set is empty.
pub fn mean_vectors(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    if vectors.is_empty() {
        return None;
    }
    let refs: Vec<&Vec<f32>> = vectors.iter().collect();
    Some(mean_of(&refs))
}

fn mean_of(vectors: &[&Vec<f32>]) -> Vec<f32> {
    let dim = vectors[0].len();
    let mut mean = vec![0.0; dim];

    for vector in vectors {
        for (slot, value) in mean.iter_mut().zip(vector.iter()) {
            *slot += value;
        }
    }

    let count = vectors.len() as f32;
    for value in &mut mean {
        *value /= count;
    }

    mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn table() -> EmbeddingTable {
        EmbeddingTable::from_pairs(vec![
            ("hello", vec![1.0, 0.0]),
            ("world", vec![0.0, 1.0]),
            ("hello world", vec![0.5, 0.5]),
        ])
        .unwrap()
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let v = vec![0.3, -1.2, 4.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let v = vec![0.3, -1.2, 4.0];
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        assert!((cosine_similarity(&v, &neg) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_magnitude() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_cosine_similarity_length_mismatch() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_whole_phrase_lookup_wins() {
        // "hello world" has a dedicated entry distinct from the token mean
        let v = table().vector("Hello World").unwrap();
        assert_eq!(v, vec![0.5, 0.5]);
    }

    #[test]
    fn test_token_average_fallback() {
        let v = table().vector("hello unknown world").unwrap();
        // "unknown" is skipped; mean of hello and world
        assert_eq!(v, vec![0.5, 0.5]);
    }

    #[test]
    fn test_unknown_phrase_is_none() {
        assert!(table().vector("quantum entanglement").is_none());
    }

    #[test]
    fn test_mean_vectors_empty() {
        assert!(mean_vectors(&[]).is_none());
    }

    #[test]
    fn test_mean_vectors() {
        let mean = mean_vectors(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(mean, vec![0.5, 0.5]);
    }

    #[test]
    fn test_from_pairs_rejects_mixed_dimensions() {
        let result = EmbeddingTable::from_pairs(vec![
            ("a", vec![1.0, 0.0]),
            ("b", vec![1.0]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_glove_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "cat 1.0 0.0 0.0").unwrap();
        writeln!(file, "dog 0.0 1.0 0.0").unwrap();
        drop(file);

        let table = EmbeddingTable::load(&path).unwrap();
        assert_eq!(table.dimension(), 3);
        assert_eq!(table.len(), 2);
        assert_eq!(table.vector("CAT").unwrap(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_load_rejects_inconsistent_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "cat 1.0 0.0").unwrap();
        writeln!(file, "dog 0.0").unwrap();
        drop(file);

        assert!(EmbeddingTable::load(&path).is_err());
    }

    #[test]
    fn test_empty_table_never_resolves() {
        let table = EmbeddingTable::empty(16);
        assert_eq!(table.dimension(), 16);
        assert!(table.vector("anything at all").is_none());
    }
}
