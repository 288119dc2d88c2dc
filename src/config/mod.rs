use serde::Deserialize;
use std::time::Duration;

use crate::services::orchestrator::OrchestratorSettings;

/// Where uploaded artifacts are kept.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    R2,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,

    /// Root directory for the local artifact store
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// R2 bucket name (r2 backend only)
    pub r2_bucket: Option<String>,

    /// R2 endpoint URL
    pub r2_endpoint: Option<String>,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: Option<String>,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: Option<String>,

    /// Vision model API key. Without it items are reported as unknown.
    pub ark_api_key: Option<String>,

    #[serde(default = "default_ark_base_url")]
    pub ark_base_url: String,

    #[serde(default = "default_ark_model")]
    pub ark_model: String,

    /// SerpAPI key. Without it market data is empty and pricing falls back.
    pub serpapi_api_key: Option<String>,

    /// Phrase appended to market search queries ("price, second-hand")
    #[serde(default = "default_search_suffix")]
    pub search_suffix: String,

    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    #[serde(default = "default_estimated_seconds")]
    pub estimated_seconds: u32,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Local
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_ark_base_url() -> String {
    "https://ark.ap-southeast.bytepluses.com/api/v3".to_string()
}

fn default_ark_model() -> String {
    "ep-20250731234418-8kgvb".to_string()
}

fn default_search_suffix() -> String {
    "ราคา มือสอง".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    60
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_estimated_seconds() -> u32 {
    30
}

/// Treat unset and blank variables alike.
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn ark_api_key(&self) -> Option<&str> {
        non_blank(&self.ark_api_key)
    }

    pub fn serpapi_api_key(&self) -> Option<&str> {
        non_blank(&self.serpapi_api_key)
    }

    /// `(bucket, endpoint, access_key, secret_key)` if all are present.
    pub fn r2_credentials(&self) -> Option<(&str, &str, &str, &str)> {
        Some((
            non_blank(&self.r2_bucket)?,
            non_blank(&self.r2_endpoint)?,
            non_blank(&self.r2_access_key)?,
            non_blank(&self.r2_secret_key)?,
        ))
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            provider_timeout: Duration::from_secs(self.provider_timeout_secs),
            max_concurrent_jobs: self.max_concurrent_jobs,
            estimated_seconds: self.estimated_seconds,
            search_suffix: self.search_suffix.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> AppConfig {
        envy::from_iter(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_without_credentials() {
        let config = from_pairs(&[]);
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.storage_backend, StorageBackend::Local);
        assert!(config.ark_api_key().is_none());
        assert!(config.serpapi_api_key().is_none());
        assert!(config.r2_credentials().is_none());

        let settings = config.orchestrator_settings();
        assert_eq!(settings.provider_timeout, Duration::from_secs(60));
        assert_eq!(settings.max_concurrent_jobs, 4);
        assert_eq!(settings.estimated_seconds, 30);
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let config = from_pairs(&[("ARK_API_KEY", "  "), ("SERPAPI_API_KEY", "abc")]);
        assert!(config.ark_api_key().is_none());
        assert_eq!(config.serpapi_api_key(), Some("abc"));
    }

    #[test]
    fn test_r2_backend_settings() {
        let config = from_pairs(&[
            ("STORAGE_BACKEND", "r2"),
            ("R2_BUCKET", "artifacts"),
            ("R2_ENDPOINT", "https://r2.example.com"),
            ("R2_ACCESS_KEY", "id"),
            ("R2_SECRET_KEY", "secret"),
            ("PROVIDER_TIMEOUT_SECS", "5"),
        ]);
        assert_eq!(config.storage_backend, StorageBackend::R2);
        assert_eq!(
            config.r2_credentials(),
            Some(("artifacts", "https://r2.example.com", "id", "secret"))
        );
        assert_eq!(config.provider_timeout_secs, 5);
    }
}
