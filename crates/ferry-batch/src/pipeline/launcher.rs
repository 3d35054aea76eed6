//! Runs one pipeline execution end to end

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::listener::{FailureAwareStepListener, JobExecutionListener, StepListener};
use super::sink::RecordStore;
use super::skip::{NeverSkipPolicy, SkipPolicy};
use super::source::ItemSource;
use super::step::{ChunkStep, DEFAULT_CHUNK_SIZE};
use crate::error::{BatchError, BatchResult};
use crate::job::{BatchStatus, JobExecution, JobExecutionTracker, JobParameters, StepExecution};
use crate::record::{
    DelimitedRecordCodec, LineMapper, NameLengthValidator, RecordValidator,
};

pub const DEFAULT_JOB_NAME: &str = "fileProcessingJob";
pub const STEP_NAME: &str = "fileProcessingStep";

/// Wires a source, the record codec, validation, a skip policy and a record
/// store into a single job, and records every run in the tracker
pub struct JobLauncher {
    job_name: String,
    tracker: Arc<JobExecutionTracker>,
    source: Arc<dyn ItemSource>,
    step: ChunkStep,
    step_listener: Arc<dyn StepListener>,
    job_listeners: Vec<Arc<dyn JobExecutionListener>>,
}

impl JobLauncher {
    pub fn builder(
        tracker: Arc<JobExecutionTracker>,
        source: Arc<dyn ItemSource>,
        store: Arc<dyn RecordStore>,
    ) -> JobLauncherBuilder {
        JobLauncherBuilder {
            job_name: DEFAULT_JOB_NAME.to_string(),
            tracker,
            source,
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
            mapper: Arc::new(DelimitedRecordCodec::default()),
            validator: Arc::new(NameLengthValidator::default()),
            skip_policy: Arc::new(NeverSkipPolicy),
            step_listener: Arc::new(FailureAwareStepListener),
            job_listeners: Vec::new(),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn tracker(&self) -> &Arc<JobExecutionTracker> {
        &self.tracker
    }

    /// Run the configured job against `parameters`
    pub async fn run(&self, parameters: JobParameters) -> BatchResult<JobExecution> {
        self.run_pipeline(&self.job_name, parameters).await
    }

    /// Execute one run and return it with its terminal status
    ///
    /// Read, decode, validation and sink failures end the run as `FAILED`
    /// and still return `Ok`. `Err` is returned only when a completion
    /// listener fails (relocation); the execution in the tracker already
    /// carries its final status at that point.
    #[instrument(skip_all, fields(job = job_name, params = %parameters))]
    pub async fn run_pipeline(
        &self,
        job_name: &str,
        parameters: JobParameters,
    ) -> BatchResult<JobExecution> {
        if let Some(previous) = self.tracker.last_execution(job_name, &parameters) {
            debug!(
                previous_id = previous.id(),
                previous_status = %previous.status(),
                previous_params = %previous.parameters(),
                "Previous execution found"
            );
        }

        let execution = self.tracker.create_execution(job_name, parameters);
        info!(execution_id = execution.id(), "Job execution started");

        let mut step = StepExecution::new(STEP_NAME);
        let outcome = match self.source.open(execution.parameters()).await {
            Ok(reader) => self.step.execute(reader, &mut step).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &outcome {
            step.failures.push(e.to_string());
        }
        step.end_time = Some(Utc::now());
        step.exit_status = Some(self.step_listener.after_step(&step));

        let (status, description) = match &outcome {
            Ok(()) => (BatchStatus::Completed, None),
            Err(e) => (BatchStatus::Failed, Some(e.to_string())),
        };
        execution.attach_step(step);
        execution.finish(status, description);
        self.tracker.update(&execution);

        match execution.status() {
            BatchStatus::Completed => {
                info!(execution_id = execution.id(), "Job execution completed")
            },
            other => warn!(
                execution_id = execution.id(),
                status = %other,
                reason = %execution.exit_description().unwrap_or_default(),
                "Job execution did not complete"
            ),
        }

        let mut listener_error = None;
        for listener in &self.job_listeners {
            if let Err(e) = listener.after_job(&execution).await {
                error!(execution_id = execution.id(), error = %e, "Job completion listener failed");
                listener_error.get_or_insert(e);
            }
        }

        match listener_error {
            Some(e) => Err(e),
            None => Ok(execution),
        }
    }
}

pub struct JobLauncherBuilder {
    job_name: String,
    tracker: Arc<JobExecutionTracker>,
    source: Arc<dyn ItemSource>,
    store: Arc<dyn RecordStore>,
    chunk_size: usize,
    mapper: Arc<dyn LineMapper>,
    validator: Arc<dyn RecordValidator>,
    skip_policy: Arc<dyn SkipPolicy>,
    step_listener: Arc<dyn StepListener>,
    job_listeners: Vec<Arc<dyn JobExecutionListener>>,
}

impl JobLauncherBuilder {
    pub fn job_name(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = job_name.into();
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn mapper(mut self, mapper: Arc<dyn LineMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn RecordValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn skip_policy(mut self, skip_policy: Arc<dyn SkipPolicy>) -> Self {
        self.skip_policy = skip_policy;
        self
    }

    pub fn step_listener(mut self, listener: Arc<dyn StepListener>) -> Self {
        self.step_listener = listener;
        self
    }

    pub fn job_listener(mut self, listener: Arc<dyn JobExecutionListener>) -> Self {
        self.job_listeners.push(listener);
        self
    }

    pub fn build(self) -> BatchResult<JobLauncher> {
        if self.job_name.trim().is_empty() {
            return Err(BatchError::Config("job name must not be empty".to_string()));
        }

        let step = ChunkStep::new(
            self.chunk_size,
            self.mapper,
            self.validator,
            self.skip_policy,
            self.store,
        )?;

        Ok(JobLauncher {
            job_name: self.job_name,
            tracker: self.tracker,
            source: self.source,
            step,
            step_listener: self.step_listener,
            job_listeners: self.job_listeners,
        })
    }
}
