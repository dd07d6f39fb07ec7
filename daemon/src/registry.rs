use common::{CrawlRequest, Job, JobId, JobStatus};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Crawl ID not found: {0}")]
    NotFound(JobId),

    #[error("Illegal status transition for crawl {id}: {from} -> {to}")]
    IllegalTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub total: usize,
    pub running: usize,
}

/// In-memory job table shared by the HTTP handlers and the background runner.
///
/// Jobs live for the lifetime of the process. There is no eviction.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new `running` job whose output goes to `<crawl_root>/<id>`.
    pub fn create(&self, request: &CrawlRequest, crawl_root: &Path) -> Job {
        let mut jobs = self.lock();
        let mut id = JobId::generate();
        while jobs.contains_key(&id) {
            id = JobId::generate();
        }
        let output_path = crawl_root.join(&id.0);
        let job = Job::new(id.clone(), request, output_path.to_string_lossy());
        jobs.insert(id, job.clone());
        job
    }

    pub fn get(&self, id: &JobId) -> Result<Job, RegistryError> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// Apply `mutation` to the job. The change is rejected, and the stored
    /// record left untouched, if it would move the status backwards or
    /// rewrite the id or output path.
    pub fn update<F>(&self, id: &JobId, mutation: F) -> Result<Job, RegistryError>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.lock();
        let current = jobs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        let mut next = current.clone();
        mutation(&mut next);

        if !current.status.can_transition_to(next.status) {
            return Err(RegistryError::IllegalTransition {
                id: id.clone(),
                from: current.status,
                to: next.status,
            });
        }
        next.crawl_id = current.crawl_id.clone();
        next.output_path = current.output_path.clone();

        *current = next.clone();
        Ok(next)
    }

    pub fn mark_completed(&self, id: &JobId) -> Result<Job, RegistryError> {
        self.update(id, |job| job.complete())
    }

    pub fn mark_failed(&self, id: &JobId, message: impl Into<String>) -> Result<Job, RegistryError> {
        let message = message.into();
        self.update(id, move |job| job.fail(message))
    }

    /// Tracked and still-running crawl counts, read under one lock.
    pub fn stats(&self) -> RegistryStats {
        let jobs = self.lock();
        RegistryStats {
            total: jobs.len(),
            running: jobs.values().filter(|job| job.status == JobStatus::Running).count(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, Job>> {
        // Updates swap in whole records, so a poisoned map is still consistent.
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn request() -> CrawlRequest {
        CrawlRequest::new("https://example.com")
    }

    #[test]
    fn test_create_is_running_with_fresh_id() {
        let registry = JobRegistry::new();
        let root = PathBuf::from("/data/crawls");
        let a = registry.create(&request(), &root);
        let b = registry.create(&request(), &root);

        assert_eq!(a.status, JobStatus::Running);
        assert_ne!(a.crawl_id, b.crawl_id);
        assert_eq!(PathBuf::from(&a.output_path), root.join(&a.crawl_id.0));
        assert_eq!(registry.stats(), RegistryStats { total: 2, running: 2 });
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let registry = JobRegistry::new();
        let err = registry.get(&JobId("nope".into())).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[test]
    fn test_terminal_status_is_final() {
        let registry = JobRegistry::new();
        let job = registry.create(&request(), Path::new("/tmp"));

        let done = registry.mark_completed(&job.crawl_id).unwrap();
        assert!(done.results_ready);

        let err = registry.mark_failed(&job.crawl_id, "late").unwrap_err();
        assert!(matches!(err, RegistryError::IllegalTransition { from: JobStatus::Completed, to: JobStatus::Failed, .. }));

        let stored = registry.get(&job.crawl_id).unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.error_message.is_none());
    }

    #[test]
    fn test_update_cannot_rewrite_identity() {
        let registry = JobRegistry::new();
        let job = registry.create(&request(), Path::new("/tmp"));

        let updated = registry
            .update(&job.crawl_id, |j| {
                j.output_path = "/elsewhere".into();
                j.crawl_id = JobId("other".into());
            })
            .unwrap();
        assert_eq!(updated.crawl_id, job.crawl_id);
        assert_eq!(updated.output_path, job.output_path);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let registry = Arc::new(JobRegistry::new());
        let ids: Vec<JobId> = (0..32)
            .map(|_| registry.create(&request(), Path::new("/tmp")).crawl_id)
            .collect();

        let writer = {
            let registry = registry.clone();
            let ids = ids.clone();
            std::thread::spawn(move || {
                for id in &ids {
                    registry.mark_completed(id).unwrap();
                }
            })
        };
        let reader = {
            let registry = registry.clone();
            let ids = ids.clone();
            std::thread::spawn(move || {
                for id in &ids {
                    registry.get(id).unwrap();
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();

        assert_eq!(registry.stats(), RegistryStats { total: 32, running: 0 });
    }
}
