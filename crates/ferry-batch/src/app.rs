//! Wiring of the engine for a loaded [`Config`]

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::archive::{Archiver, LocalArchiver, ObjectStoreArchiver};
use crate::config::{Config, Profile, StoreKind};
use crate::error::BatchResult;
use crate::job::{JobExecution, JobExecutionTracker, JobParameters};
use crate::pipeline::{
    policy_for_limit, ArchivingJobListener, InMemoryRecordStore, ItemSource, JobLauncher,
    LocalFileSource, ObjectStoreSource, PgRecordStore, RecordStore,
};
use crate::queue::{QueueService, SqsQueueService};
use crate::record::{DelimitedRecordCodec, NameLengthValidator};
use crate::storage::S3ObjectStore;
use crate::trigger::{DirectoryWatcher, ListenerHandle, QueueListener};

/// The pieces a profile plugs into the launcher
pub struct Components {
    pub source: Arc<dyn ItemSource>,
    pub archiver: Arc<dyn Archiver>,
    pub store: Arc<dyn RecordStore>,
    /// Required by the aws profile only
    pub queue: Option<Arc<dyn QueueService>>,
}

pub struct App {
    config: Config,
    launcher: Arc<JobLauncher>,
    queue: Option<Arc<dyn QueueService>>,
}

impl App {
    /// Connect to the services `config` names and assemble the engine
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let store = record_store(&config).await?;

        let components = match config.profile {
            Profile::Filesystem => Components {
                source: Arc::new(LocalFileSource),
                archiver: Arc::new(LocalArchiver::new(
                    &config.file.archive_dir,
                    &config.file.error_dir,
                )),
                store,
                queue: None,
            },
            Profile::Aws => {
                let settings = config.aws_settings();
                let objects = Arc::new(S3ObjectStore::from_settings(&settings).await);
                Components {
                    source: Arc::new(ObjectStoreSource::new(objects.clone())),
                    archiver: Arc::new(ObjectStoreArchiver::new(objects)),
                    store,
                    queue: Some(Arc::new(SqsQueueService::from_settings(&settings).await)),
                }
            },
        };

        Self::assemble(config, components)
    }

    pub fn assemble(config: Config, components: Components) -> anyhow::Result<Self> {
        let codec = DelimitedRecordCodec::new(config.record.delimiter.clone())
            .context("Invalid record delimiter")?;

        let launcher = JobLauncher::builder(
            Arc::new(JobExecutionTracker::new()),
            components.source,
            components.store,
        )
        .job_name(config.job.name.clone())
        .chunk_size(config.job.chunk_size)
        .mapper(Arc::new(codec))
        .validator(Arc::new(NameLengthValidator::new(config.record.max_name_length)))
        .skip_policy(policy_for_limit(config.job.skip_limit))
        .job_listener(Arc::new(ArchivingJobListener::new(components.archiver)))
        .build()
        .context("Invalid job configuration")?;

        Ok(Self {
            config,
            launcher: Arc::new(launcher),
            queue: components.queue,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn launcher(&self) -> &Arc<JobLauncher> {
        &self.launcher
    }

    /// Start the trigger for the configured profile
    pub fn start_listener(&self) -> anyhow::Result<ListenerHandle> {
        match self.config.profile {
            Profile::Filesystem => {
                for dir in [
                    &self.config.file.input_dir,
                    &self.config.file.archive_dir,
                    &self.config.file.error_dir,
                ] {
                    std::fs::create_dir_all(dir)
                        .with_context(|| format!("Failed to create {}", dir.display()))?;
                }

                let watcher =
                    DirectoryWatcher::new(&self.config.file.input_dir, self.launcher.clone())
                        .with_settle_delay(self.config.settle_delay());
                Ok(watcher.spawn()?)
            },
            Profile::Aws => {
                let queue = self
                    .queue
                    .clone()
                    .context("The aws profile needs a queue service")?;
                let listener =
                    QueueListener::new(queue, self.launcher.clone(), self.config.queue_settings());
                Ok(listener.spawn())
            },
        }
    }

    /// Run the pipeline once for a local file
    pub async fn process_file(&self, path: &Path) -> BatchResult<JobExecution> {
        info!(file = %path.display(), "Processing file");
        self.launcher.run(JobParameters::for_local_file(path)).await
    }
}

async fn record_store(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.store.kind {
        StoreKind::Memory => Ok(Arc::new(InMemoryRecordStore::new())),
        StoreKind::Postgres => {
            let url = config
                .store
                .database_url
                .as_deref()
                .context("store.database_url is required for the postgres store")?;
            let store = PgRecordStore::connect(url, config.store.max_connections).await?;
            store.migrate().await?;
            info!("Record store migrations completed");
            Ok(Arc::new(store))
        },
    }
}
