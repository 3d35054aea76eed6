//! Shared fixtures for ferry-batch integration tests
//!
//! Everything runs against the in-memory object store, queue and record
//! store, plus temporary directories; no network or database is needed.

#![allow(dead_code, clippy::unwrap_used)]

use anyhow::bail;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ferry_batch::archive::{LocalArchiver, ObjectStoreArchiver};
use ferry_batch::job::JobExecutionTracker;
use ferry_batch::pipeline::{
    ArchivingJobListener, InMemoryRecordStore, JobLauncher, LocalFileSource, ObjectStoreSource,
    RecordStore,
};
use ferry_batch::record::Record;
use ferry_batch::storage::InMemoryObjectStore;

pub const BUCKET: &str = "b";

/// Route engine logs to the test output; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ferry_batch=debug")
        .with_test_writer()
        .try_init();
}

/// Scratch input, archive and error directories
pub struct Dirs {
    pub root: tempfile::TempDir,
}

impl Dirs {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        for dir in ["input", "archive", "error", "staging"] {
            std::fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        Self { root }
    }

    pub fn input(&self) -> PathBuf {
        self.root.path().join("input")
    }

    pub fn archive(&self) -> PathBuf {
        self.root.path().join("archive")
    }

    pub fn error(&self) -> PathBuf {
        self.root.path().join("error")
    }

    /// Write `content` to `input/<name>` and return the path
    pub fn write_input(&self, name: &str, content: &str) -> PathBuf {
        let path = self.input().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Write `content` outside the watched directory, then rename it in so
    /// a watcher sees the complete file at once
    pub fn drop_into_input(&self, name: &str, content: &str) -> PathBuf {
        let staged = self.root.path().join("staging").join(name);
        std::fs::write(&staged, content).unwrap();
        let target = self.input().join(name);
        std::fs::rename(&staged, &target).unwrap();
        target
    }
}

pub fn local_launcher(dirs: &Dirs, store: Arc<dyn RecordStore>, chunk_size: usize) -> JobLauncher {
    JobLauncher::builder(
        Arc::new(JobExecutionTracker::new()),
        Arc::new(LocalFileSource),
        store,
    )
    .chunk_size(chunk_size)
    .job_listener(Arc::new(ArchivingJobListener::new(Arc::new(
        LocalArchiver::new(dirs.archive(), dirs.error()),
    ))))
    .build()
    .unwrap()
}

pub fn object_launcher(objects: Arc<InMemoryObjectStore>, store: Arc<dyn RecordStore>) -> JobLauncher {
    JobLauncher::builder(
        Arc::new(JobExecutionTracker::new()),
        Arc::new(ObjectStoreSource::new(objects.clone())),
        store,
    )
    .job_listener(Arc::new(ArchivingJobListener::new(Arc::new(
        ObjectStoreArchiver::new(objects),
    ))))
    .build()
    .unwrap()
}

pub fn memory_store() -> Arc<InMemoryRecordStore> {
    Arc::new(InMemoryRecordStore::new())
}

pub fn exists(path: &Path) -> bool {
    path.try_exists().unwrap()
}

/// Accepts the first `succeed` chunks, then refuses every call
pub struct FailingRecordStore {
    inner: InMemoryRecordStore,
    succeed: usize,
    calls: AtomicUsize,
}

impl FailingRecordStore {
    pub fn after(succeed: usize) -> Self {
        Self {
            inner: InMemoryRecordStore::new(),
            succeed,
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn records(&self) -> Vec<Record> {
        self.inner.records().await
    }
}

#[async_trait]
impl RecordStore for FailingRecordStore {
    async fn save_all(&self, records: Vec<Record>) -> anyhow::Result<Vec<Record>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.succeed {
            bail!("connection reset by peer");
        }
        self.inner.save_all(records).await
    }
}

/// Shared, ordered log of side effects observed across collaborators
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

/// Record store that logs each flush before delegating
pub struct LoggingRecordStore {
    pub inner: InMemoryRecordStore,
    pub log: EventLog,
}

#[async_trait]
impl RecordStore for LoggingRecordStore {
    async fn save_all(&self, records: Vec<Record>) -> anyhow::Result<Vec<Record>> {
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        self.log.push(format!("save:{}", names.join(",")));
        self.inner.save_all(records).await
    }
}
