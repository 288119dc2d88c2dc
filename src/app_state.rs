use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::{AppConfig, StorageBackend};
use crate::services::{
    orchestrator::Orchestrator,
    providers::{
        ark::ArkVisionClient,
        offline::{OfflineIdentifier, OfflineMarket},
        serpapi::SerpApiClient,
        IdentificationProvider, MarketLookupProvider,
    },
    registry::{InMemoryJobRegistry, JobRegistry},
    storage::{ArtifactStore, LocalArtifactStore, R2ArtifactStore, StorageError},
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            started_at: Utc::now(),
        }
    }

    /// Wire storage, registry and providers from configuration.
    ///
    /// Missing provider credentials select the offline providers; only a
    /// misconfigured artifact store is fatal.
    pub fn from_config(config: &AppConfig) -> Result<Self, StorageError> {
        let store: Arc<dyn ArtifactStore> = match config.storage_backend {
            StorageBackend::Local => {
                tracing::info!(upload_dir = %config.upload_dir, "Using local artifact store");
                Arc::new(LocalArtifactStore::new(&config.upload_dir)?)
            }
            StorageBackend::R2 => {
                let (bucket, endpoint, access_key, secret_key) =
                    config.r2_credentials().ok_or_else(|| {
                        StorageError::Config(
                            "STORAGE_BACKEND=r2 requires R2_BUCKET, R2_ENDPOINT, R2_ACCESS_KEY and R2_SECRET_KEY"
                                .to_string(),
                        )
                    })?;
                tracing::info!(bucket = %bucket, "Using R2 artifact store");
                Arc::new(R2ArtifactStore::new(bucket, endpoint, access_key, secret_key)?)
            }
        };

        let identifier: Arc<dyn IdentificationProvider> = match config.ark_api_key() {
            Some(key) => Arc::new(ArkVisionClient::new(
                &config.ark_base_url,
                key,
                &config.ark_model,
            )),
            None => {
                tracing::warn!("ARK_API_KEY not set; items will be reported as unknown");
                Arc::new(OfflineIdentifier)
            }
        };

        let market: Arc<dyn MarketLookupProvider> = match config.serpapi_api_key() {
            Some(key) => Arc::new(SerpApiClient::new(key)),
            None => {
                tracing::warn!("SERPAPI_API_KEY not set; prices will use the default estimate");
                Arc::new(OfflineMarket)
            }
        };

        let registry: Arc<dyn JobRegistry> = Arc::new(InMemoryJobRegistry::new());

        Ok(Self::new(Orchestrator::new(
            registry,
            store,
            identifier,
            market,
            config.orchestrator_settings(),
        )))
    }
}
