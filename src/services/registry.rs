//! Job registry: the single source of truth for polling.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use crate::models::job::{InvalidTransition, Job, JobUpdate};

#[async_trait]
pub trait JobRegistry: Send + Sync {
    async fn create(&self, job: Job) -> Result<(), RegistryError>;

    async fn get(&self, id: Uuid) -> Result<Job, RegistryError>;

    /// Atomically merge `update` into the record and return the new state.
    ///
    /// An outcome from a superseded generation leaves the record untouched;
    /// the returned job's `attempt` tells the caller whether it landed.
    async fn update(&self, id: Uuid, update: JobUpdate) -> Result<Job, RegistryError>;

    /// Remove a record, returning it if it existed.
    async fn delete(&self, id: Uuid) -> Result<Option<Job>, RegistryError>;

    /// All jobs of an owner, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Job>, RegistryError>;

    async fn count(&self) -> Result<usize, RegistryError>;

    /// Release resources at process stop.
    async fn shutdown(&self) {}
}

struct Entry {
    seq: u64,
    job: Job,
}

#[derive(Default)]
struct Table {
    next_seq: u64,
    entries: HashMap<Uuid, Entry>,
}

/// Process-lifetime registry backed by a locked hash map.
///
/// Locks are never held across an await point, so each operation is a
/// single atomic read-modify-write on the table.
#[derive(Default)]
pub struct InMemoryJobRegistry {
    table: RwLock<Table>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRegistry for InMemoryJobRegistry {
    async fn create(&self, job: Job) -> Result<(), RegistryError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if table.entries.contains_key(&job.id) {
            return Err(RegistryError::AlreadyExists(job.id));
        }
        let seq = table.next_seq;
        table.next_seq += 1;
        table.entries.insert(job.id, Entry { seq, job });
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Job, RegistryError> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .entries
            .get(&id)
            .map(|entry| entry.job.clone())
            .ok_or(RegistryError::NotFound(id))
    }

    async fn update(&self, id: Uuid, update: JobUpdate) -> Result<Job, RegistryError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let entry = table
            .entries
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;

        // Apply to a copy so a rejected transition leaves the record untouched.
        let mut job = entry.job.clone();
        if job.apply(update)? {
            entry.job = job.clone();
        }
        Ok(job)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Job>, RegistryError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        Ok(table.entries.remove(&id).map(|entry| entry.job))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Job>, RegistryError> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let mut owned: Vec<&Entry> = table
            .entries
            .values()
            .filter(|entry| entry.job.owner_id.as_deref() == Some(owner_id))
            .collect();
        owned.sort_by(|a, b| {
            b.job
                .created_at
                .cmp(&a.job.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(owned.into_iter().map(|entry| entry.job.clone()).collect())
    }

    async fn count(&self) -> Result<usize, RegistryError> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        Ok(table.entries.len())
    }

    async fn shutdown(&self) {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(jobs = table.entries.len(), "Discarding in-memory job registry");
        table.entries.clear();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job already exists: {0}")]
    AlreadyExists(Uuid),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}
