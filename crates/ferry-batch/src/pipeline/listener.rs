//! Step and job completion hooks

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::archive::Archiver;
use crate::error::{BatchError, BatchResult};
use crate::job::{BatchStatus, ExitStatus, JobExecution, StepExecution};

/// Called once the step has drained its input or failed
pub trait StepListener: Send + Sync {
    fn after_step(&self, step: &StepExecution) -> ExitStatus;
}

/// `FAILED` if the step recorded any failure, `COMPLETED` otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureAwareStepListener;

impl StepListener for FailureAwareStepListener {
    fn after_step(&self, step: &StepExecution) -> ExitStatus {
        if step.failures.is_empty() {
            info!(
                step = %step.step_name,
                read = step.read_count,
                written = step.write_count,
                skipped = step.skip_count,
                "Step completed"
            );
            ExitStatus::Completed
        } else {
            for failure in &step.failures {
                error!(step = %step.step_name, failure = %failure, "Step failed");
            }
            ExitStatus::Failed
        }
    }
}

/// Called after the execution status has been finalized
#[async_trait]
pub trait JobExecutionListener: Send + Sync {
    async fn after_job(&self, execution: &JobExecution) -> BatchResult<()>;
}

/// Relocates the input of a finished run through an [`Archiver`]
#[derive(Clone)]
pub struct ArchivingJobListener {
    archiver: Arc<dyn Archiver>,
}

impl ArchivingJobListener {
    pub fn new(archiver: Arc<dyn Archiver>) -> Self {
        Self { archiver }
    }
}

#[async_trait]
impl JobExecutionListener for ArchivingJobListener {
    async fn after_job(&self, execution: &JobExecution) -> BatchResult<()> {
        let succeeded = match execution.status() {
            BatchStatus::Completed => true,
            BatchStatus::Failed => false,
            BatchStatus::Started => {
                debug!(execution_id = execution.id(), "Execution still running, not archiving");
                return Ok(());
            },
        };

        let parameters = execution.parameters();
        let (Some(identity), Some(file_name)) =
            (parameters.source_identity(), parameters.file_name())
        else {
            warn!(
                execution_id = execution.id(),
                parameters = %parameters,
                "No source to relocate"
            );
            return Err(BatchError::RelocationFailure {
                identity: parameters.to_string(),
                reason: "source location or file name parameter missing".to_string(),
            });
        };

        self.archiver.relocate(identity, file_name, succeeded).await
    }
}
