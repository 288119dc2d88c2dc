use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::item::AnalysisReport;

/// Status of an analysis job.
///
/// `pending → processing → {completed, error}`. Terminal states only change
/// through an explicit restart or deletion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Forward transitions of a single execution.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Error)
        )
    }
}

/// One submitted analysis request and its lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub owner_id: Option<String>,
    /// Artifact Store location tokens, in upload order.
    pub artifacts: Vec<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<AnalysisReport>,
    pub error: Option<String>,
    pub estimated_seconds: u32,
    /// Execution generation. Bumped by every restart; outcomes carry the
    /// generation they ran under.
    #[serde(default)]
    pub attempt: u32,
}

/// Partial update applied to a job record by the registry.
///
/// Fields not named by a variant (owner, artifacts, creation time) are never
/// touched.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    /// `pending → processing`
    Start,
    /// Manual re-trigger: any state `→ processing`, clearing the prior outcome
    /// and starting a new generation.
    Restart,
    Complete {
        report: AnalysisReport,
        at: DateTime<Utc>,
        attempt: u32,
    },
    Fail {
        message: String,
        at: DateTime<Utc>,
        attempt: u32,
    },
}

impl JobUpdate {
    pub fn target(&self) -> JobStatus {
        match self {
            JobUpdate::Start | JobUpdate::Restart => JobStatus::Processing,
            JobUpdate::Complete { .. } => JobStatus::Completed,
            JobUpdate::Fail { .. } => JobStatus::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid job transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

impl Job {
    pub fn new_pending(
        id: Uuid,
        owner_id: Option<String>,
        artifacts: Vec<String>,
        estimated_seconds: u32,
    ) -> Self {
        Self {
            id,
            owner_id,
            artifacts,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
            estimated_seconds,
            attempt: 0,
        }
    }

    /// Merge an update into this record, enforcing the state machine.
    ///
    /// On success exactly one of `result`/`error` is set for terminal states
    /// and neither is set otherwise. An outcome from an older generation is
    /// ignored and `Ok(false)` returned; the record is left as it is.
    pub fn apply(&mut self, update: JobUpdate) -> Result<bool, InvalidTransition> {
        if let JobUpdate::Complete { attempt, .. } | JobUpdate::Fail { attempt, .. } = &update {
            if *attempt != self.attempt {
                return Ok(false);
            }
        }

        let to = update.target();
        if !matches!(update, JobUpdate::Restart) && !self.status.can_transition_to(to) {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }

        match update {
            JobUpdate::Start => {
                self.result = None;
                self.error = None;
                self.completed_at = None;
            }
            JobUpdate::Restart => {
                self.result = None;
                self.error = None;
                self.completed_at = None;
                self.attempt += 1;
            }
            JobUpdate::Complete { report, at, .. } => {
                self.result = Some(report);
                self.error = None;
                self.completed_at = Some(at);
            }
            JobUpdate::Fail { message, at, .. } => {
                self.result = None;
                self.error = Some(message);
                self.completed_at = Some(at);
            }
        }
        self.status = to;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::{ItemDescription, PriceEstimate};

    fn sample_job() -> Job {
        Job::new_pending(
            Uuid::new_v4(),
            Some("alice".to_string()),
            vec!["a/b.jpg".to_string()],
            30,
        )
    }

    fn sample_report() -> AnalysisReport {
        AnalysisReport {
            item: ItemDescription::unknown(),
            price_estimate: PriceEstimate {
                min: 1.0,
                max: 2.0,
                suggested: 1.5,
                currency: "THB".to_string(),
                confidence: 85,
            },
            comparables: vec![],
        }
    }

    #[test]
    fn test_forward_transitions() {
        let mut job = sample_job();
        job.apply(JobUpdate::Start).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.completed_at.is_none());

        job.apply(JobUpdate::Complete {
            report: sample_report(),
            at: Utc::now(),
            attempt: 0,
        })
        .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.result.is_some());
        assert!(job.error.is_none());
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_cannot_complete_pending_job() {
        let mut job = sample_job();
        let err = job
            .apply(JobUpdate::Fail {
                message: "boom".to_string(),
                at: Utc::now(),
                attempt: 0,
            })
            .unwrap_err();
        assert_eq!(err.from, JobStatus::Pending);
        assert_eq!(err.to, JobStatus::Error);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_terminal_state_rejects_start() {
        let mut job = sample_job();
        job.apply(JobUpdate::Start).unwrap();
        job.apply(JobUpdate::Fail {
            message: "provider down".to_string(),
            at: Utc::now(),
            attempt: 0,
        })
        .unwrap();

        assert!(job.apply(JobUpdate::Start).is_err());
        assert!(job
            .apply(JobUpdate::Complete {
                report: sample_report(),
                at: Utc::now(),
                attempt: 0,
            })
            .is_err());
        assert_eq!(job.error.as_deref(), Some("provider down"));
    }

    #[test]
    fn test_restart_clears_outcome() {
        let mut job = sample_job();
        job.apply(JobUpdate::Start).unwrap();
        job.apply(JobUpdate::Complete {
            report: sample_report(),
            at: Utc::now(),
            attempt: 0,
        })
        .unwrap();

        job.apply(JobUpdate::Restart).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.result.is_none());
        assert!(job.error.is_none());
        assert!(job.completed_at.is_none());
        assert_eq!(job.artifacts, vec!["a/b.jpg".to_string()]);
        assert_eq!(job.attempt, 1);
    }

    #[test]
    fn test_outcome_from_older_generation_is_ignored() {
        let mut job = sample_job();
        job.apply(JobUpdate::Start).unwrap();
        job.apply(JobUpdate::Restart).unwrap();
        assert_eq!(job.attempt, 1);

        let applied = job
            .apply(JobUpdate::Complete {
                report: sample_report(),
                at: Utc::now(),
                attempt: 0,
            })
            .unwrap();
        assert!(!applied);
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.result.is_none());

        let applied = job
            .apply(JobUpdate::Fail {
                message: "timed out".to_string(),
                at: Utc::now(),
                attempt: 1,
            })
            .unwrap();
        assert!(applied);
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(JobStatus::Processing.to_string(), "processing");
        assert_eq!("error".parse::<JobStatus>().unwrap(), JobStatus::Error);
        assert_eq!(
            serde_json::to_string(&JobStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
