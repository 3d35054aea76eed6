//! Post-run relocation of processed inputs
//!
//! After a run reaches a terminal status its input is moved out of the way:
//! into the archive location on success, into the error location on failure.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::{BatchError, BatchResult};
use crate::storage::ObjectStore;

pub const ARCHIVE_PREFIX: &str = "archive";
pub const ERROR_PREFIX: &str = "error";

#[async_trait]
pub trait Archiver: Send + Sync {
    /// Move the input identified by `source_identity` (a local path or a
    /// bucket name) to the archive or error location
    ///
    /// Fails with [`BatchError::RelocationFailure`]; the run status is not
    /// affected.
    async fn relocate(
        &self,
        source_identity: &str,
        file_name: &str,
        succeeded: bool,
    ) -> BatchResult<()>;
}

/// Moves local files into an archive or error directory
#[derive(Debug, Clone)]
pub struct LocalArchiver {
    archive_dir: PathBuf,
    error_dir: PathBuf,
}

impl LocalArchiver {
    pub fn new(archive_dir: impl Into<PathBuf>, error_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            error_dir: error_dir.into(),
        }
    }

    pub fn target_dir(&self, succeeded: bool) -> &Path {
        if succeeded {
            &self.archive_dir
        } else {
            &self.error_dir
        }
    }

    async fn move_file(source: &Path, target: &Path) -> std::io::Result<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match tokio::fs::rename(source, target).await {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                // rename cannot cross filesystems; fall back to copy + remove
                if tokio::fs::metadata(source).await.is_err() {
                    return Err(rename_err);
                }
                tokio::fs::copy(source, target).await?;
                tokio::fs::remove_file(source).await
            },
        }
    }
}

#[async_trait]
impl Archiver for LocalArchiver {
    #[instrument(skip(self))]
    async fn relocate(
        &self,
        source_identity: &str,
        file_name: &str,
        succeeded: bool,
    ) -> BatchResult<()> {
        let source = Path::new(source_identity);
        let target = self.target_dir(succeeded).join(file_name);

        Self::move_file(source, &target)
            .await
            .map_err(|e| BatchError::RelocationFailure {
                identity: source_identity.to_string(),
                reason: format!("move to {} failed: {}", target.display(), e),
            })?;

        info!(
            source = %source.display(),
            target = %target.display(),
            "File relocated"
        );
        Ok(())
    }
}

/// Moves objects under the `archive/` or `error/` prefix of their bucket
#[derive(Clone)]
pub struct ObjectStoreArchiver {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreArchiver {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Key the object lands on; any prefix of `key` is dropped
    pub fn target_key(key: &str, succeeded: bool) -> String {
        let base = key.rsplit('/').next().unwrap_or(key);
        let prefix = if succeeded { ARCHIVE_PREFIX } else { ERROR_PREFIX };
        format!("{}/{}", prefix, base)
    }
}

#[async_trait]
impl Archiver for ObjectStoreArchiver {
    #[instrument(skip(self))]
    async fn relocate(&self, bucket: &str, key: &str, succeeded: bool) -> BatchResult<()> {
        let target = Self::target_key(key, succeeded);
        let identity = format!("s3://{}/{}", bucket, key);

        self.store
            .copy_object(bucket, key, &target)
            .await
            .map_err(|e| BatchError::RelocationFailure {
                identity: identity.clone(),
                reason: format!("copy to {} failed: {}", target, e),
            })?;

        if let Err(e) = self.store.delete_object(bucket, key).await {
            warn!(bucket, key, target = %target, "Object copied but source was not deleted");
            return Err(BatchError::RelocationFailure {
                identity,
                reason: format!("copied to {} but delete failed: {}", target, e),
            });
        }

        info!(bucket, key, target = %target, "Object relocated");
        Ok(())
    }
}
