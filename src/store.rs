use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::db::KeyValueStore;
use crate::error::ScoutError;
use crate::models::Job;

pub const SAVED_JOBS_KEY: &str = "saved_jobs";

#[derive(Debug, Serialize, Deserialize)]
struct SavedJobsDocument {
    updated_at: DateTime<Utc>,
    jobs: Vec<Job>,
}

/// Owns the current search results and the persisted saved-jobs list.
pub struct JobListStore {
    search_results: Vec<Job>,
    saved: Vec<Job>,
    storage: Box<dyn KeyValueStore>,
}

impl JobListStore {
    /// Loads the saved list from `storage`. A missing or unreadable document
    /// yields an empty list; startup never fails here.
    pub fn load(storage: Box<dyn KeyValueStore>) -> Self {
        let saved = match read_saved(storage.as_ref()) {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("Discarding saved jobs: {}", e);
                Vec::new()
            }
        };
        debug!("Loaded {} saved job(s)", saved.len());
        Self {
            search_results: Vec::new(),
            saved,
            storage,
        }
    }

    pub fn search_results(&self) -> &[Job] {
        &self.search_results
    }

    pub fn saved_jobs(&self) -> &[Job] {
        &self.saved
    }

    pub fn replace_search_results(&mut self, jobs: Vec<Job>) {
        self.search_results = jobs;
    }

    pub fn append_search_results(&mut self, batch: Vec<Job>) {
        let mut next = std::mem::take(&mut self.search_results);
        next.extend(batch);
        self.replace_search_results(next);
    }

    pub fn clear_search_results(&mut self) {
        self.replace_search_results(Vec::new());
    }

    pub fn is_saved(&self, job_id: &str) -> bool {
        self.saved.iter().any(|j| j.id == job_id)
    }

    pub fn saved_job(&self, job_id: &str) -> Option<&Job> {
        self.saved.iter().find(|j| j.id == job_id)
    }

    /// Returns true when the job was added.
    pub fn save(&mut self, job: Job) -> bool {
        if self.is_saved(&job.id) {
            return false;
        }
        debug!("Saving job {}", job.id);
        self.saved.push(job);
        self.persist();
        true
    }

    /// Returns true when a job was removed.
    pub fn unsave(&mut self, job_id: &str) -> bool {
        let before = self.saved.len();
        self.saved.retain(|j| j.id != job_id);
        if self.saved.len() == before {
            return false;
        }
        debug!("Removed saved job {}", job_id);
        self.persist();
        true
    }

    /// Flips saved state; returns the new state.
    pub fn toggle_saved(&mut self, job: &Job) -> bool {
        if self.is_saved(&job.id) {
            self.unsave(&job.id);
            false
        } else {
            self.save(job.clone());
            true
        }
    }

    fn persist(&self) {
        let doc = SavedJobsDocument {
            updated_at: Utc::now(),
            jobs: self.saved.clone(),
        };
        let result = serde_json::to_string(&doc)
            .map_err(|e| ScoutError::Persistence(e.to_string()))
            .and_then(|json| self.storage.set(SAVED_JOBS_KEY, &json));
        if let Err(e) = result {
            error!("Failed to write saved jobs: {}", e);
        }
    }
}

fn read_saved(storage: &dyn KeyValueStore) -> Result<Vec<Job>, ScoutError> {
    let Some(raw) = storage.get(SAVED_JOBS_KEY)? else {
        return Ok(Vec::new());
    };
    let doc: SavedJobsDocument =
        serde_json::from_str(&raw).map_err(|e| ScoutError::Persistence(e.to_string()))?;

    // An id is only ever saved once.
    let mut jobs: Vec<Job> = Vec::with_capacity(doc.jobs.len());
    for job in doc.jobs {
        if !jobs.iter().any(|j| j.id == job.id) {
            jobs.push(job);
        }
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, SqliteStore};
    use crate::models::sample_job;

    fn empty_store() -> JobListStore {
        JobListStore::load(Box::new(MemoryStore::new()))
    }

    #[test]
    fn test_save_is_idempotent() {
        let mut store = empty_store();
        assert!(store.save(sample_job("a")));
        assert!(store.is_saved("a"));
        assert!(!store.save(sample_job("a")));
        assert_eq!(store.saved_jobs().len(), 1);
    }

    #[test]
    fn test_unsave_absent_is_noop() {
        let mut store = empty_store();
        store.save(sample_job("a"));
        assert!(!store.unsave("missing"));
        assert_eq!(store.saved_jobs().len(), 1);
        assert!(store.unsave("a"));
        assert!(!store.is_saved("a"));
    }

    #[test]
    fn test_toggle_saved() {
        let mut store = empty_store();
        let job = sample_job("t");
        assert!(store.toggle_saved(&job));
        assert!(store.is_saved("t"));
        assert!(!store.toggle_saved(&job));
        assert!(store.saved_jobs().is_empty());
    }

    #[test]
    fn test_append_extends_results_in_order() {
        let mut store = empty_store();
        store.replace_search_results(vec![sample_job("1")]);
        store.append_search_results(vec![sample_job("2"), sample_job("3")]);
        let ids: Vec<&str> = store.search_results().iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);

        store.clear_search_results();
        assert!(store.search_results().is_empty());
    }

    #[test]
    fn test_saved_jobs_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = JobListStore::load(Box::new(SqliteStore::open(dir.path()).unwrap()));
            store.save(sample_job("keep"));
            store.save(sample_job("drop"));
            store.unsave("drop");
        }
        let store = JobListStore::load(Box::new(SqliteStore::open(dir.path()).unwrap()));
        assert_eq!(store.saved_jobs().len(), 1);
        assert_eq!(store.saved_job("keep").unwrap().title, "Engineer keep");
        assert!(store.search_results().is_empty());
    }

    #[test]
    fn test_corrupt_document_loads_empty() {
        let storage = MemoryStore::with_entry(SAVED_JOBS_KEY, "{not json");
        let store = JobListStore::load(Box::new(storage));
        assert!(store.saved_jobs().is_empty());
    }

    #[test]
    fn test_write_failure_keeps_memory_state() {
        let mut store = JobListStore::load(Box::new(MemoryStore::read_only()));
        assert!(store.save(sample_job("a")));
        assert!(store.is_saved("a"));
    }
}
