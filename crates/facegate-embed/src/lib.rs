//! facegate-embed — HTTP client for the face-embedding inference service.
//!
//! The service is an opaque oracle: it receives an image and answers
//! with zero or more fixed-length embedding vectors, one per detected
//! face, in detection order. This crate is only the wire adapter; the
//! image is posted as base64-encoded PNG in a small JSON envelope.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use facegate_core::{Embedding, EmbeddingOracle, OracleError};

#[derive(Serialize)]
struct ExtractRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct ExtractResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for a remote embedding service speaking the `/extract` JSON
/// protocol.
pub struct EmbedClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl EmbedClient {
    /// Build a client with a per-request timeout baked into the
    /// underlying connection pool.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Service(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }

    fn map_send_error(&self, err: reqwest::Error) -> OracleError {
        if err.is_timeout() {
            OracleError::Timeout(self.timeout.as_secs())
        } else {
            OracleError::Service(err.to_string())
        }
    }
}

#[async_trait]
impl EmbeddingOracle for EmbedClient {
    async fn extract(&self, image: &RgbImage) -> Result<Vec<Embedding>, OracleError> {
        let mut png = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut png, image::ImageFormat::Png)
            .map_err(|e| OracleError::Service(format!("image encode: {e}")))?;
        let encoded = STANDARD.encode(png.into_inner());

        let url = format!("{}/extract", self.base_url);
        let mut request = self.http.post(&url).json(&ExtractRequest { image: &encoded });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Service(format!("HTTP {status}: {body}")));
        }

        let payload: ExtractResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;

        tracing::debug!(faces = payload.embeddings.len(), "embedding service responded");
        Ok(payload.embeddings.into_iter().map(Embedding::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client =
            EmbedClient::new("http://localhost:5100/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "http://localhost:5100");
    }

    #[test]
    fn test_extract_response_shape() {
        let payload: ExtractResponse =
            serde_json::from_str(r#"{"embeddings": [[0.1, 0.2], [0.3, 0.4]]}"#).unwrap();
        assert_eq!(payload.embeddings.len(), 2);
        assert_eq!(payload.embeddings[0], vec![0.1, 0.2]);
    }
}
