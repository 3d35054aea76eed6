//! Starts a run for every file that appears in the input directory

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ListenerHandle;
use crate::error::{BatchError, BatchResult};
use crate::job::JobParameters;
use crate::pipeline::JobLauncher;

pub struct DirectoryWatcher {
    input_dir: PathBuf,
    launcher: Arc<JobLauncher>,
    settle_delay: Duration,
}

impl DirectoryWatcher {
    pub fn new(input_dir: impl Into<PathBuf>, launcher: Arc<JobLauncher>) -> Self {
        Self {
            input_dir: input_dir.into(),
            launcher,
            settle_delay: Duration::ZERO,
        }
    }

    /// Wait this long after a file appears before reading it
    ///
    /// Without a delay a file still being written is read as it stands;
    /// files renamed into the directory are complete when they appear.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Register the watch and start the event loop
    ///
    /// The watch is in place when this returns, so files created afterwards
    /// are seen. Files already in the directory are not processed.
    pub fn spawn(self) -> BatchResult<ListenerHandle> {
        if !self.input_dir.is_dir() {
            return Err(BatchError::Trigger(format!(
                "input directory {} does not exist",
                self.input_dir.display()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            // receiver gone means the loop has stopped
            let _ = tx.send(event);
        })
        .map_err(|e| BatchError::Trigger(format!("cannot create watcher: {}", e)))?;

        watcher
            .watch(&self.input_dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                BatchError::Trigger(format!(
                    "cannot watch {}: {}",
                    self.input_dir.display(),
                    e
                ))
            })?;

        info!(dir = %self.input_dir.display(), "Watching directory for new files");

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(watcher, rx, token).await });

        Ok(ListenerHandle::new("directory-watcher", cancel, task))
    }

    async fn run(
        self,
        // dropping the watcher ends the watch
        _watcher: RecommendedWatcher,
        mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
        cancel: CancellationToken,
    ) -> BatchResult<()> {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                Some(Ok(event)) => {
                    for path in created_files(&event) {
                        self.trigger(path).await;
                    }
                },
                Some(Err(e)) => warn!(error = %e, "Watch error"),
                None => {
                    warn!("Watch event channel closed");
                    break;
                },
            }
        }

        info!(dir = %self.input_dir.display(), "Directory watcher stopped");
        Ok(())
    }

    async fn trigger(&self, path: PathBuf) {
        info!(file = %path.display(), "New file detected");
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let parameters = JobParameters::for_local_file(&path);
        match self.launcher.run(parameters).await {
            Ok(execution) => debug!(
                file = %path.display(),
                execution_id = execution.id(),
                status = %execution.status(),
                "Run finished"
            ),
            Err(e) => error!(file = %path.display(), error = %e, "Error processing file"),
        }
    }
}

/// Paths of files created in, or moved into, the watched directory
pub(crate) fn created_files(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .filter(|p| !is_directory(p))
            .cloned()
            .collect(),
        _ => Vec::new(),
    }
}

fn is_directory(path: &Path) -> bool {
    path.metadata().map(|m| m.is_dir()).unwrap_or(false)
}
