//! Job bookkeeping
//!
//! A [`JobInstance`] is the logical job (one per job name), a [`JobExecution`]
//! is one run of it against one set of [`JobParameters`]. Executions are owned by
//! the [`JobExecutionTracker`] for the lifetime of the process.

pub mod params;
pub mod tracker;

pub use params::{JobParameter, JobParameters, JobParametersBuilder};
pub use tracker::JobExecutionTracker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Status of a job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Started,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &str {
        match self {
            BatchStatus::Started => "STARTED",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Failed => "FAILED",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, BatchStatus::Started)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse outcome reported by the step-completion hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitStatus {
    Completed,
    Failed,
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Completed => f.write_str("COMPLETED"),
            ExitStatus::Failed => f.write_str("FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobInstance {
    pub id: i64,
    pub job_name: String,
}

/// Counters collected while a file is read, validated and written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepExecution {
    pub step_name: String,
    pub read_count: u64,
    pub write_count: u64,
    /// Records dropped by the skip policy
    pub skip_count: u64,
    /// Chunks flushed to the record store
    pub commit_count: u64,
    pub failures: Vec<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub exit_status: Option<ExitStatus>,
}

impl StepExecution {
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            start_time: Some(Utc::now()),
            ..Default::default()
        }
    }
}

/// Mutable part of an execution
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub status: BatchStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Cause of a failed run
    pub exit_description: Option<String>,
    pub step: Option<StepExecution>,
}

struct ExecutionInner {
    id: i64,
    instance: JobInstance,
    parameters: JobParameters,
    state: Mutex<ExecutionState>,
}

/// One run of a job
///
/// Cloning is cheap and every clone observes the same state, so the handle the
/// tracker stores reflects the status the pipeline sets later.
#[derive(Clone)]
pub struct JobExecution {
    inner: Arc<ExecutionInner>,
}

impl JobExecution {
    pub(crate) fn new(id: i64, instance: JobInstance, parameters: JobParameters) -> Self {
        Self {
            inner: Arc::new(ExecutionInner {
                id,
                instance,
                parameters,
                state: Mutex::new(ExecutionState {
                    status: BatchStatus::Started,
                    start_time: Utc::now(),
                    end_time: None,
                    exit_description: None,
                    step: None,
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ExecutionState> {
        // plain data, still valid after a poisoning panic
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> i64 {
        self.inner.id
    }

    pub fn instance(&self) -> &JobInstance {
        &self.inner.instance
    }

    pub fn job_name(&self) -> &str {
        &self.inner.instance.job_name
    }

    pub fn parameters(&self) -> &JobParameters {
        &self.inner.parameters
    }

    pub fn status(&self) -> BatchStatus {
        self.state().status
    }

    pub fn exit_description(&self) -> Option<String> {
        self.state().exit_description.clone()
    }

    pub fn step_execution(&self) -> Option<StepExecution> {
        self.state().step.clone()
    }

    pub fn snapshot(&self) -> ExecutionState {
        self.state().clone()
    }

    /// Record the terminal status. Only the first call takes effect.
    pub fn finish(&self, status: BatchStatus, exit_description: Option<String>) {
        let mut state = self.state();
        if !state.status.is_running() {
            return;
        }
        state.status = status;
        state.end_time = Some(Utc::now());
        state.exit_description = exit_description;
    }

    pub fn attach_step(&self, step: StepExecution) {
        self.state().step = Some(step);
    }
}

impl fmt::Debug for JobExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("JobExecution")
            .field("id", &self.inner.id)
            .field("instance", &self.inner.instance)
            .field("parameters", &self.inner.parameters)
            .field("status", &state.status)
            .field("exit_description", &state.exit_description)
            .finish()
    }
}

impl PartialEq for JobExecution {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for JobExecution {}
