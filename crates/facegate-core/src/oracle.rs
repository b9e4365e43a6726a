use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;

use crate::types::Embedding;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("embedding service: {0}")]
    Service(String),
    #[error("embedding service timed out after {0}s")]
    Timeout(u64),
    #[error("malformed embedding payload: {0}")]
    Malformed(String),
}

/// External face-embedding extractor.
///
/// Implementations must be safe for concurrent use (`Send + Sync`).
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    /// Extract one embedding per detected face, in detection order.
    ///
    /// An image in which no face is detected yields an empty vector;
    /// that is a normal outcome, not an error.
    async fn extract(&self, image: &RgbImage) -> Result<Vec<Embedding>, OracleError>;
}
