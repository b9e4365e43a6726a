use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("embedding length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
}

/// Face embedding vector (128-dimensional for the default extraction model).
///
/// Immutable once produced. Embeddings are only ever compared through
/// [`Embedding::distance`]; the individual components carry no meaning
/// on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance to another embedding of the same length.
    ///
    /// Mismatched lengths are rejected, never truncated or padded: two
    /// embeddings of different lengths came from different models and
    /// any distance between them would be meaningless.
    pub fn distance(&self, other: &Embedding) -> Result<f32, EmbeddingError> {
        if self.values.len() != other.values.len() {
            return Err(EmbeddingError::LengthMismatch {
                left: self.values.len(),
                right: other.values.len(),
            });
        }

        let sum: f32 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        Ok(sum.sqrt())
    }
}

/// One reference face in the gallery.
///
/// Created only during a gallery rebuild and immutable afterwards.
/// `name` need not be unique: several entries with the same name are
/// alternate photos of the same person.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub name: String,
    pub embedding: Embedding,
}

/// Result of comparing a probe embedding against one or more references.
///
/// `confidence` is `1 − distance`: 1 at distance zero, lower as the
/// distance grows. It is not clamped, so pathological embeddings can
/// push it below zero.
#[derive(Debug, Clone)]
pub struct MatchDecision {
    pub matched_name: Option<String>,
    pub distance: f32,
    pub is_match: bool,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_identical() {
        let a = Embedding::new(vec![0.1, 0.2, 0.3]);
        let b = a.clone();
        assert_eq!(a.distance(&b).unwrap(), 0.0);
    }

    #[test]
    fn test_distance_known_value() {
        // 3-4-5 triangle: components differ by 3 and 4, distance is 5.
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.distance(&b).unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = Embedding::new(vec![1.0, 2.0]);
        let b = Embedding::new(vec![4.0, 6.0]);
        assert_eq!(a.distance(&b).unwrap(), b.distance(&a).unwrap());
    }

    #[test]
    fn test_distance_length_mismatch() {
        let a = Embedding::new(vec![1.0, 2.0]);
        let b = Embedding::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(
            a.distance(&b),
            Err(EmbeddingError::LengthMismatch { left: 2, right: 3 })
        );
    }
}
