use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::item::{Comparable, ItemDescription, PriceEstimate};
use crate::models::job::{Job, JobStatus};

/// Response after submitting images for analysis.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: String,
    pub estimated_seconds: u32,
}

/// Public view of a job returned by poll, history and rerun.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobView {
    pub job_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_description: Option<ItemDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_estimate: Option<PriceEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(default)]
    pub comparables: Vec<Comparable>,
    pub artifact_count: usize,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub estimated_seconds: u32,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        let report = job.result.as_ref();
        Self {
            job_id: job.id,
            owner_id: job.owner_id.clone(),
            status: job.status,
            item_description: report.map(|r| r.item.clone()),
            price_estimate: report.map(|r| r.price_estimate.clone()),
            confidence: report.map(|r| r.price_estimate.confidence),
            comparables: report.map(|r| r.comparables.clone()).unwrap_or_default(),
            artifact_count: job.artifacts.len(),
            created_at: job.created_at,
            completed_at: job.completed_at,
            error_message: job.error.clone(),
            estimated_seconds: job.estimated_seconds,
        }
    }
}

/// Query string of the history endpoint.
#[derive(Debug, Deserialize, Validate)]
pub struct HistoryQuery {
    #[garde(range(min = 1))]
    #[serde(default = "default_page")]
    pub page: usize,

    #[garde(range(min = 1, max = 100))]
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    20
}

/// One page of an owner's jobs, newest first.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub jobs: Vec<JobView>,
    pub total_count: usize,
    pub page: usize,
    pub limit: usize,
}

impl HistoryResponse {
    /// Slice an already newest-first list into the requested page.
    pub fn paginate(jobs: &[Job], page: usize, limit: usize) -> Self {
        let start = page.saturating_sub(1).saturating_mul(limit);
        Self {
            jobs: jobs
                .iter()
                .skip(start)
                .take(limit)
                .map(JobView::from)
                .collect(),
            total_count: jobs.len(),
            page,
            limit,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub job_id: Uuid,
    pub deleted: bool,
    pub message: String,
}
