//! facegate-assets — HTTP client for the asset library holding reference
//! photographs.
//!
//! The library is queried with a folder-scoped search, then each asset's
//! content is downloaded individually. A failed download skips that one
//! asset; only the enumeration itself is fatal to the call.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use facegate_core::{Asset, AssetSource, SourceError};

#[derive(Serialize)]
struct SearchRequest<'a> {
    expression: &'a str,
    with_field: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    resources: Vec<Resource>,
}

#[derive(Deserialize)]
struct Resource {
    public_id: String,
    secure_url: Option<String>,
    url: Option<String>,
    context: Option<ResourceContext>,
}

#[derive(Deserialize)]
struct ResourceContext {
    custom: Option<CustomFields>,
}

#[derive(Deserialize)]
struct CustomFields {
    name: Option<String>,
}

impl Resource {
    fn display_name(&self) -> Option<String> {
        self.context
            .as_ref()
            .and_then(|c| c.custom.as_ref())
            .and_then(|c| c.name.clone())
    }

    fn download_url(&self) -> Option<&str> {
        self.secure_url.as_deref().or(self.url.as_deref())
    }
}

/// Client for a media-library HTTP API with key/secret authentication.
pub struct AssetLibrary {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    max_results: usize,
    timeout: Duration,
}

impl AssetLibrary {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        max_results: usize,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Library(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            max_results,
            timeout,
        })
    }

    fn map_send_error(&self, err: reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout(self.timeout.as_secs())
        } else {
            SourceError::Library(err.to_string())
        }
    }

    async fn search(&self, folder: &str) -> Result<Vec<Resource>, SourceError> {
        let expression = format!("folder:{folder}");
        let body = SearchRequest {
            expression: &expression,
            with_field: "context",
            max_results: self.max_results,
        };

        let response = self
            .http
            .post(format!("{}/resources/search", self.base_url))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Library(format!("HTTP {status}: {body}")));
        }

        let payload: SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Library(format!("malformed search response: {e}")))?;
        Ok(payload.resources)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?
            .error_for_status()
            .map_err(|e| SourceError::Library(e.to_string()))?;

        let bytes = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AssetSource for AssetLibrary {
    async fn list_assets(&self, folder: &str) -> Result<Vec<Asset>, SourceError> {
        let resources = self.search(folder).await?;
        tracing::debug!(folder, found = resources.len(), "asset search complete");

        let mut assets = Vec::with_capacity(resources.len());
        for resource in resources {
            let Some(url) = resource.download_url() else {
                tracing::warn!(asset = %resource.public_id, "resource has no download URL, skipping");
                continue;
            };

            match self.download(url).await {
                Ok(content) => assets.push(Asset {
                    display_name: resource.display_name(),
                    asset_id: resource.public_id,
                    content,
                }),
                Err(err) => {
                    tracing::warn!(asset = %resource.public_id, error = %err, "asset download failed, skipping");
                }
            }
        }

        tracing::info!(folder, count = assets.len(), "assets downloaded");
        Ok(assets)
    }
}
