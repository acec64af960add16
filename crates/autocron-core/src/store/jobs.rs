//! JobStore: durable CRUD over the job list.

use std::sync::Arc;

use autocron_protocols::{JobEntry, JobId, JobSpec, StoreError, TextStore};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::validate::validate_spec;
use crate::error::{CronError, CronResult};

/// Persistent, ordered set of job entries.
///
/// Every mutation loads the whole set, changes it and writes it back while
/// holding one lock, so concurrent writers never lose updates. The lock
/// also guards the highest id this instance has handed out, which keeps
/// ids from being reused after the newest job is deleted.
pub struct JobStore {
    backend: Arc<dyn TextStore>,
    high_water: Mutex<u64>,
}

impl JobStore {
    pub fn new(backend: Arc<dyn TextStore>) -> Self {
        Self {
            backend,
            high_water: Mutex::new(0),
        }
    }

    pub fn location(&self) -> String {
        self.backend.location()
    }

    async fn load(&self) -> Result<Vec<JobEntry>, StoreError> {
        match self.backend.read().await? {
            Some(content) if !content.trim().is_empty() => serde_json::from_str(&content)
                .map_err(|e| StoreError::Corrupt {
                    location: self.backend.location(),
                    reason: e.to_string(),
                }),
            _ => Ok(Vec::new()),
        }
    }

    async fn save(&self, entries: &[JobEntry]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(entries)?;
        self.backend.write(&content).await
    }

    /// Validate a spec, assign the next id and persist the new entry.
    pub async fn add(&self, spec: &JobSpec) -> CronResult<JobEntry> {
        validate_spec(spec)?;

        let mut high_water = self.high_water.lock().await;
        let mut entries = self.load().await?;
        let max_existing = entries.iter().map(|e| e.id.0).max().unwrap_or(0);
        let id = JobId(max_existing.max(*high_water) + 1);
        let entry = JobEntry::from_spec(id, spec)?;

        entries.push(entry.clone());
        self.save(&entries).await?;
        *high_water = id.0;

        info!(job_id = %id, cron = %entry.cron_expression, "Job added");
        Ok(entry)
    }

    /// Validate a spec and swap it in under an existing id, keeping the
    /// entry's position.
    pub async fn replace(&self, id: JobId, spec: &JobSpec) -> CronResult<JobEntry> {
        validate_spec(spec)?;

        let _guard = self.high_water.lock().await;
        let mut entries = self.load().await?;
        let slot = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(CronError::NotFound(id))?;
        let entry = JobEntry::from_spec(id, spec)?;
        *slot = entry.clone();
        self.save(&entries).await?;

        info!(job_id = %id, cron = %entry.cron_expression, "Job replaced");
        Ok(entry)
    }

    pub async fn get_by_id(&self, id: JobId) -> Result<Option<JobEntry>, StoreError> {
        Ok(self.load().await?.into_iter().find(|e| e.id == id))
    }

    /// All entries in insertion order.
    pub async fn get_all(&self) -> Result<Vec<JobEntry>, StoreError> {
        self.load().await
    }

    pub async fn delete(&self, id: JobId) -> Result<Option<JobEntry>, StoreError> {
        let _guard = self.high_water.lock().await;
        let mut entries = self.load().await?;
        let Some(index) = entries.iter().position(|e| e.id == id) else {
            debug!(job_id = %id, "Delete of unknown job");
            return Ok(None);
        };
        let removed = entries.remove(index);
        self.save(&entries).await?;

        info!(job_id = %id, "Job deleted");
        Ok(Some(removed))
    }

    /// Remove every entry, returning what was stored.
    pub async fn clear(&self) -> Result<Vec<JobEntry>, StoreError> {
        let mut high_water = self.high_water.lock().await;
        let entries = self.load().await?;
        if let Some(max) = entries.iter().map(|e| e.id.0).max() {
            *high_water = (*high_water).max(max);
        }
        self.save(&[]).await?;

        info!(count = entries.len(), "All jobs deleted");
        Ok(entries)
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
