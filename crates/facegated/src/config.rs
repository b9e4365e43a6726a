use facegate_core::matcher;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Listen address for the HTTP surface.
    pub bind_addr: String,
    /// Maximum distance for a positive identification match.
    pub identify_tolerance: f32,
    /// Maximum distance for a positive verification match.
    pub verify_tolerance: f32,
    /// Base URL of the face-embedding inference service.
    pub embed_url: String,
    /// Bearer token for the embedding service, if it requires one.
    pub embed_api_key: Option<String>,
    /// Base URL of the asset library holding reference photos.
    pub asset_base_url: String,
    pub asset_api_key: String,
    pub asset_api_secret: String,
    /// Library folder containing the reference photos.
    pub asset_folder: String,
    /// Cap on assets pulled per refresh.
    pub max_assets: usize,
    /// Timeout in seconds for downloading a photo by URL.
    pub fetch_timeout_secs: u64,
    /// Timeout in seconds for one embedding-service call.
    pub oracle_timeout_secs: u64,
    /// Origins allowed to call the HTTP surface from a browser.
    pub allowed_origins: Vec<String>,
    /// Cap on request body size (base64 photos get large).
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_string("FACEGATE_BIND_ADDR", "0.0.0.0:5001"),
            identify_tolerance: env_f32(
                "FACEGATE_IDENTIFY_TOLERANCE",
                matcher::DEFAULT_IDENTIFY_TOLERANCE,
            ),
            verify_tolerance: env_f32(
                "FACEGATE_VERIFY_TOLERANCE",
                matcher::DEFAULT_VERIFY_TOLERANCE,
            ),
            embed_url: env_string("FACEGATE_EMBED_URL", "http://127.0.0.1:5100"),
            embed_api_key: std::env::var("FACEGATE_EMBED_API_KEY").ok(),
            asset_base_url: env_string("FACEGATE_ASSET_BASE_URL", "http://127.0.0.1:5200"),
            asset_api_key: env_string("FACEGATE_ASSET_API_KEY", ""),
            asset_api_secret: env_string("FACEGATE_ASSET_API_SECRET", ""),
            asset_folder: env_string("FACEGATE_ASSET_FOLDER", "members"),
            max_assets: env_usize("FACEGATE_MAX_ASSETS", 500),
            fetch_timeout_secs: env_u64("FACEGATE_FETCH_TIMEOUT_SECS", 10),
            oracle_timeout_secs: env_u64("FACEGATE_ORACLE_TIMEOUT_SECS", 10),
            allowed_origins: env_list(
                "FACEGATE_ALLOWED_ORIGINS",
                "http://localhost:3000,http://localhost:5000",
            ),
            max_body_bytes: env_usize("FACEGATE_MAX_BODY_BYTES", 10 * 1024 * 1024),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    env_string(key, default)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
