use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("asset library: {0}")]
    Library(String),
    #[error("asset library timed out after {0}s")]
    Timeout(u64),
}

/// One reference photograph pulled from the asset library.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Library-assigned identifier, e.g. `members/jane-doe`.
    pub asset_id: String,
    /// Explicit display name, when the library carries one.
    pub display_name: Option<String>,
    /// Raw image bytes as stored in the library.
    pub content: Vec<u8>,
}

/// Remote store of reference photographs.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Enumerate and download every asset in a folder.
    ///
    /// Individual assets that cannot be downloaded are skipped with a
    /// warning. An `Err` means the enumeration itself failed; no
    /// partial result is returned in that case.
    async fn list_assets(&self, folder: &str) -> Result<Vec<Asset>, SourceError>;
}
