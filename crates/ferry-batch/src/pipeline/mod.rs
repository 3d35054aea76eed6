//! The file-ingest pipeline
//!
//! A run opens its input through an [`ItemSource`], pushes every line through
//! the record codec and validator in [`ChunkStep`], flushes accepted records
//! to a [`RecordStore`] in chunks, and hands the finished execution to the
//! completion listeners.

pub mod launcher;
pub mod listener;
pub mod sink;
pub mod skip;
pub mod source;
pub mod step;

pub use launcher::{JobLauncher, JobLauncherBuilder, DEFAULT_JOB_NAME, STEP_NAME};
pub use listener::{
    ArchivingJobListener, FailureAwareStepListener, JobExecutionListener, StepListener,
};
pub use sink::{InMemoryRecordStore, PgRecordStore, RecordStore};
pub use skip::{policy_for_limit, LimitSkipPolicy, NeverSkipPolicy, SkipPolicy};
pub use source::{ItemSource, LocalFileSource, ObjectStoreSource};
pub use step::{Chunk, ChunkStep, DEFAULT_CHUNK_SIZE};
