//! Job orchestration: submission, background execution and lifecycle
//! operations.
//!
//! `submit` validates and persists the upload, records a `pending` job and
//! hands execution to a tracked background task. The task waits for a
//! concurrency permit, moves the job to `processing`, calls the providers
//! (each bounded by a timeout) and always finishes in `completed` or `error`.
//! There is no automatic retry; `rerun` is the only way to execute again.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::error::{AnalysisError, ValidationError};
use crate::models::item::{AnalysisReport, ItemDescription};
use crate::models::job::{Job, JobUpdate};
use crate::services::pricing;
use crate::services::providers::{
    self, IdentificationProvider, MarketLookupProvider, ProviderError,
};
use crate::services::registry::{JobRegistry, RegistryError};
use crate::services::storage::{ArtifactStore, StorageError};

/// Maximum number of images per submission.
pub const MAX_ARTIFACTS: usize = 5;

/// Maximum size of a single image (10 MiB).
pub const MAX_ARTIFACT_BYTES: usize = 10 * 1024 * 1024;

/// Required prefix of every declared content type.
const IMAGE_MEDIA_PREFIX: &str = "image/";

/// One uploaded file as received from the API surface.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub provider_timeout: Duration,
    pub max_concurrent_jobs: usize,
    pub estimated_seconds: u32,
    /// Locale phrase appended to every market search query.
    pub search_suffix: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(60),
            max_concurrent_jobs: 4,
            estimated_seconds: 30,
            search_suffix: "ราคา มือสอง".to_string(),
        }
    }
}

/// Failure inside a background execution, recorded on the job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job has no artifacts to analyze")]
    NoArtifacts,

    #[error("Failed to read artifact: {0}")]
    Storage(#[from] StorageError),

    #[error("Item identification failed: {0}")]
    Identification(ProviderError),

    #[error("Market lookup failed: {0}")]
    MarketLookup(ProviderError),
}

struct Inner {
    registry: Arc<dyn JobRegistry>,
    store: Arc<dyn ArtifactStore>,
    identifier: Arc<dyn IdentificationProvider>,
    market: Arc<dyn MarketLookupProvider>,
    settings: OrchestratorSettings,
    permits: Semaphore,
    tracker: TaskTracker,
}

/// Drives jobs through `pending → processing → {completed, error}`.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

/// Check count, media type and size of every upload.
pub fn validate_uploads(uploads: &[Upload]) -> Result<(), ValidationError> {
    if uploads.is_empty() {
        return Err(ValidationError::NoArtifacts);
    }
    if uploads.len() > MAX_ARTIFACTS {
        return Err(ValidationError::TooManyArtifacts {
            count: uploads.len(),
            max: MAX_ARTIFACTS,
        });
    }

    for (index, upload) in uploads.iter().enumerate() {
        let is_image = upload
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with(IMAGE_MEDIA_PREFIX));
        if !is_image {
            return Err(ValidationError::UnsupportedMediaType {
                index,
                content_type: upload.content_type.clone(),
            });
        }
        if upload.bytes.len() > MAX_ARTIFACT_BYTES {
            return Err(ValidationError::ArtifactTooLarge {
                index,
                size: upload.bytes.len(),
                max: MAX_ARTIFACT_BYTES,
            });
        }
    }
    Ok(())
}

/// Market search query for an identified item.
pub fn search_query(item: &ItemDescription, suffix: &str) -> String {
    [item.name.as_str(), item.series.as_str(), suffix]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Orchestrator {
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        store: Arc<dyn ArtifactStore>,
        identifier: Arc<dyn IdentificationProvider>,
        market: Arc<dyn MarketLookupProvider>,
        settings: OrchestratorSettings,
    ) -> Self {
        let permits = Semaphore::new(settings.max_concurrent_jobs.max(1));
        Self {
            inner: Arc::new(Inner {
                registry,
                store,
                identifier,
                market,
                settings,
                permits,
                tracker: TaskTracker::new(),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<dyn JobRegistry> {
        &self.inner.registry
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.inner.store
    }

    pub fn identifier_mode(&self) -> &'static str {
        self.inner.identifier.mode()
    }

    pub fn market_mode(&self) -> &'static str {
        self.inner.market.mode()
    }

    /// Number of executions scheduled or running.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Validate, persist and schedule a new job.
    ///
    /// On any error no job exists afterwards and no artifact is left behind.
    pub async fn submit(
        &self,
        owner_id: Option<String>,
        uploads: Vec<Upload>,
    ) -> Result<Job, AnalysisError> {
        validate_uploads(&uploads)?;

        let id = Uuid::new_v4();
        let mut artifacts = Vec::with_capacity(uploads.len());
        for upload in &uploads {
            match self
                .inner
                .store
                .save(id, &upload.file_name, &upload.bytes)
                .await
            {
                Ok(location) => artifacts.push(location),
                Err(e) => {
                    tracing::error!(job_id = %id, error = %e, "Failed to store artifact");
                    self.discard_artifacts(id).await;
                    return Err(e.into());
                }
            }
        }

        let job = Job::new_pending(
            id,
            owner_id,
            artifacts,
            self.inner.settings.estimated_seconds,
        );
        if let Err(e) = self.inner.registry.create(job.clone()).await {
            self.discard_artifacts(id).await;
            return Err(e.into());
        }

        metrics::counter!("analysis_jobs_submitted_total").increment(1);
        tracing::info!(
            job_id = %id,
            owner_id = job.owner_id.as_deref().unwrap_or("-"),
            artifacts = job.artifacts.len(),
            "Analysis job submitted"
        );

        self.schedule(id);
        Ok(job)
    }

    /// Current state of a job.
    pub async fn get(&self, id: Uuid) -> Result<Job, AnalysisError> {
        Ok(self.inner.registry.get(id).await?)
    }

    /// Remove a job and all of its artifacts.
    pub async fn delete(&self, id: Uuid) -> Result<Job, AnalysisError> {
        self.inner.registry.get(id).await?;

        let removed_scope = self.inner.store.delete_all(id).await?;
        let job = self
            .inner
            .registry
            .delete(id)
            .await?
            .ok_or(AnalysisError::NotFound(id))?;

        tracing::info!(job_id = %id, removed_scope, "Analysis job deleted");
        Ok(job)
    }

    /// Re-execute a job in place, overwriting any prior result or error.
    ///
    /// Safe on any state. The restart starts a new generation, so an
    /// execution already running for this job can no longer write its
    /// outcome. Runs to a terminal state before returning unless another
    /// re-run supersedes this one first.
    pub async fn rerun(&self, id: Uuid) -> Result<Job, AnalysisError> {
        self.inner.registry.get(id).await?;
        tracing::info!(job_id = %id, "Manual re-run requested");
        Ok(self.execute(id, JobUpdate::Restart).await?)
    }

    /// Stop accepting background work and wait for running executions.
    pub async fn shutdown(&self, grace: Duration) {
        self.inner.tracker.close();
        if tokio::time::timeout(grace, self.inner.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                in_flight = self.inner.tracker.len(),
                "Shutdown grace period elapsed with executions still running"
            );
        }
    }

    fn schedule(&self, id: Uuid) {
        let orchestrator = self.clone();
        self.inner.tracker.spawn(async move {
            let Ok(_permit) = orchestrator.inner.permits.acquire().await else {
                return;
            };
            if let Err(e) = orchestrator.execute(id, JobUpdate::Start).await {
                tracing::warn!(
                    job_id = %id,
                    error = %e,
                    "Job changed during execution; outcome discarded"
                );
            }
        });
    }

    /// The execution routine. Always writes a terminal state unless the job
    /// was deleted or a newer run superseded this one.
    async fn execute(&self, id: Uuid, start: JobUpdate) -> Result<Job, RegistryError> {
        let job = self.inner.registry.update(id, start).await?;
        let attempt = job.attempt;
        tracing::info!(job_id = %id, attempt, status = %job.status, "Analysis started");

        let started = Instant::now();
        metrics::gauge!("analysis_jobs_in_flight").increment(1.0);
        let outcome = self.analyze(&job).await;
        metrics::gauge!("analysis_jobs_in_flight").decrement(1.0);
        metrics::histogram!("analysis_processing_seconds").record(started.elapsed().as_secs_f64());

        let finish = match outcome {
            Ok(report) => JobUpdate::Complete {
                report,
                at: Utc::now(),
                attempt,
            },
            Err(e) => {
                tracing::warn!(job_id = %id, attempt, error = %e, "Analysis failed");
                JobUpdate::Fail {
                    message: e.to_string(),
                    at: Utc::now(),
                    attempt,
                }
            }
        };

        let job = self.inner.registry.update(id, finish).await?;
        if job.attempt != attempt {
            tracing::info!(
                job_id = %id,
                attempt,
                current_attempt = job.attempt,
                "Superseded by a newer run; outcome discarded"
            );
            return Ok(job);
        }

        match &job.result {
            Some(report) => {
                metrics::counter!("analysis_jobs_completed_total").increment(1);
                tracing::info!(
                    job_id = %id,
                    attempt,
                    item = %report.item.name,
                    comparables = report.comparables.len(),
                    suggested = report.price_estimate.suggested,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Analysis completed"
                );
            }
            None => metrics::counter!("analysis_jobs_failed_total").increment(1),
        }
        Ok(job)
    }

    /// Identify the primary artifact, look up comparables and price them.
    ///
    /// Only the first artifact is analyzed.
    async fn analyze(&self, job: &Job) -> Result<AnalysisReport, JobError> {
        let primary = job.artifacts.first().ok_or(JobError::NoArtifacts)?;
        let image = self.inner.store.read(primary).await?;

        let item = self
            .bounded(self.inner.identifier.identify(&image))
            .await
            .map_err(JobError::Identification)?;

        let query = search_query(&item, &self.inner.settings.search_suffix);
        tracing::debug!(job_id = %job.id, query = %query, "Searching market");
        let listings = self
            .bounded(self.inner.market.search(&query))
            .await
            .map_err(JobError::MarketLookup)?;

        let comparables = providers::to_comparables(listings);
        let price_estimate = pricing::synthesize(&comparables);

        Ok(AnalysisReport {
            item,
            price_estimate,
            comparables,
        })
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        let limit = self.inner.settings.provider_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| ProviderError::Timeout(limit))?
    }

    async fn discard_artifacts(&self, id: Uuid) {
        if let Err(e) = self.inner.store.delete_all(id).await {
            tracing::warn!(job_id = %id, error = %e, "Failed to clean up artifacts");
        }
    }
}
