//! In-memory job execution tracker
//!
//! Process-scoped replacement for a durable job repository. Built once at
//! startup and shared as `Arc<JobExecutionTracker>`; nothing survives a restart
//! and nothing is evicted.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

use super::{JobExecution, JobInstance, JobParameters};

/// Ledger of job instances and executions
///
/// Each map operation is atomic on its own; there is no locking across two
/// operations. Two callers racing to create the first instance for a name may
/// both create one. Ids never collide, so neither insert is lost.
#[derive(Default)]
pub struct JobExecutionTracker {
    instances: DashMap<i64, JobInstance>,
    executions: DashMap<i64, JobExecution>,
    instance_seq: AtomicI64,
    execution_seq: AtomicI64,
}

impl JobExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff any stored instance carries `job_name`
    pub fn instance_exists(&self, job_name: &str) -> bool {
        self.instances.iter().any(|i| i.job_name == job_name)
    }

    /// Allocate and store a new instance. Does not check for duplicates.
    pub fn create_instance(&self, job_name: &str) -> JobInstance {
        let instance = JobInstance {
            id: self.instance_seq.fetch_add(1, Ordering::SeqCst) + 1,
            job_name: job_name.to_string(),
        };
        self.instances.insert(instance.id, instance.clone());
        debug!(instance_id = instance.id, job_name, "Created job instance");
        instance
    }

    /// Create a `STARTED` execution bound to the instance for `job_name`,
    /// creating that instance first if none exists.
    ///
    /// Instances are matched by name only; differing parameters still share
    /// one instance.
    pub fn create_execution(&self, job_name: &str, parameters: JobParameters) -> JobExecution {
        let instance = self
            .find_instance(job_name)
            .unwrap_or_else(|| self.create_instance(job_name));

        let id = self.execution_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let execution = JobExecution::new(id, instance, parameters);
        self.executions.insert(id, execution.clone());

        debug!(
            execution_id = id,
            instance_id = execution.instance().id,
            job_name,
            "Created job execution"
        );
        execution
    }

    /// Store `execution` unless an execution with the same id is already
    /// stored. Later updates for a stored id are dropped; status changes reach
    /// the tracker through the shared [`JobExecution`] handle instead.
    pub fn update(&self, execution: &JobExecution) {
        self.executions
            .entry(execution.id())
            .or_insert_with(|| execution.clone());
    }

    /// Most recently created execution whose instance has `job_name`
    ///
    /// Execution ids are allocated in insertion order, so the highest id wins.
    /// `_parameters` is accepted for symmetry with `create_execution` and is
    /// not used for matching.
    pub fn last_execution(
        &self,
        job_name: &str,
        _parameters: &JobParameters,
    ) -> Option<JobExecution> {
        self.executions
            .iter()
            .filter(|e| e.job_name() == job_name)
            .max_by_key(|e| e.id())
            .map(|e| e.value().clone())
    }

    pub fn get_execution(&self, execution_id: i64) -> Option<JobExecution> {
        self.executions.get(&execution_id).map(|e| e.value().clone())
    }

    pub fn execution_count(&self) -> usize {
        self.executions.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn find_instance(&self, job_name: &str) -> Option<JobInstance> {
        self.instances
            .iter()
            .filter(|i| i.job_name == job_name)
            .min_by_key(|i| i.id)
            .map(|i| i.value().clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::job::BatchStatus;
    use std::sync::Arc;

    const JOB: &str = "fileProcessingJob";

    fn params(key: &str) -> JobParameters {
        JobParameters::for_object("bucket", key)
    }

    #[test]
    fn test_instance_exists_after_create_instance() {
        let tracker = JobExecutionTracker::new();
        assert!(!tracker.instance_exists(JOB));
        tracker.create_instance(JOB);
        assert!(tracker.instance_exists(JOB));
        assert!(!tracker.instance_exists("otherJob"));
    }

    #[test]
    fn test_instance_exists_after_create_execution() {
        let tracker = JobExecutionTracker::new();
        assert!(!tracker.instance_exists(JOB));
        tracker.create_execution(JOB, params("a.csv"));
        assert!(tracker.instance_exists(JOB));
    }

    #[test]
    fn test_create_instance_does_not_deduplicate() {
        let tracker = JobExecutionTracker::new();
        let first = tracker.create_instance(JOB);
        let second = tracker.create_instance(JOB);
        assert_ne!(first.id, second.id);
        assert_eq!(tracker.instance_count(), 2);
    }

    #[test]
    fn test_executions_share_one_instance_per_name() {
        let tracker = JobExecutionTracker::new();
        let a = tracker.create_execution(JOB, params("a.csv"));
        let b = tracker.create_execution(JOB, params("b.csv"));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.instance(), b.instance());
        assert_eq!(tracker.instance_count(), 1);
        assert_eq!(a.status(), BatchStatus::Started);
    }

    #[test]
    fn test_last_execution_is_most_recent_for_name() {
        let tracker = JobExecutionTracker::new();
        assert!(tracker.last_execution(JOB, &params("x")).is_none());

        tracker.create_execution(JOB, params("a.csv"));
        let latest = tracker.create_execution(JOB, params("b.csv"));
        tracker.create_execution("otherJob", params("c.csv"));

        let found = tracker.last_execution(JOB, &params("ignored")).unwrap();
        assert_eq!(found, latest);
        assert!(tracker.last_execution("missingJob", &params("x")).is_none());
    }

    #[test]
    fn test_update_is_first_write_wins() {
        let tracker = JobExecutionTracker::new();
        let execution = tracker.create_execution(JOB, params("a.csv"));

        // A foreign handle with the same id does not replace the stored one.
        let other = JobExecutionTracker::new();
        let impostor = other.create_execution("impostor", params("z.csv"));
        assert_eq!(impostor.id(), execution.id());
        tracker.update(&impostor);
        assert_eq!(
            tracker.get_execution(execution.id()).unwrap().job_name(),
            JOB
        );

        // Status changes on the tracked handle are visible.
        execution.finish(BatchStatus::Completed, None);
        tracker.update(&execution);
        let stored = tracker.last_execution(JOB, &params("a.csv")).unwrap();
        assert_eq!(stored.status(), BatchStatus::Completed);
    }

    #[test]
    fn test_update_stores_unknown_execution() {
        let tracker = JobExecutionTracker::new();
        let foreign = JobExecutionTracker::new().create_execution(JOB, params("a.csv"));
        assert!(tracker.get_execution(foreign.id()).is_none());
        tracker.update(&foreign);
        assert!(tracker.get_execution(foreign.id()).is_some());
    }

    #[test]
    fn test_concurrent_executions_for_different_names() {
        let tracker = Arc::new(JobExecutionTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        tracker.create_execution(&format!("job-{}", n), params(&i.to_string()));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.execution_count(), 200);
        assert_eq!(tracker.instance_count(), 8);
        for n in 0..8 {
            assert!(tracker.instance_exists(&format!("job-{}", n)));
        }
    }
}
