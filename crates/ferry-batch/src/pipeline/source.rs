//! Where a run reads its lines from

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::BufReader;

use crate::error::{BatchError, BatchResult};
use crate::job::params::{BUCKET_NAME, FILE_NAME, FILE_PATH};
use crate::job::JobParameters;
use crate::storage::{ObjectReader, ObjectStore};

/// Opens the input of one run as a buffered byte stream
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Fails with [`BatchError::SourceUnavailable`] when the input cannot be opened
    async fn open(&self, parameters: &JobParameters) -> BatchResult<ObjectReader>;
}

/// Reads the file named by the `filePath` parameter
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSource;

#[async_trait]
impl ItemSource for LocalFileSource {
    async fn open(&self, parameters: &JobParameters) -> BatchResult<ObjectReader> {
        let path = parameters
            .get_string(FILE_PATH)
            .map(PathBuf::from)
            .ok_or_else(|| missing_parameter(FILE_PATH))?;

        let file = File::open(&path)
            .await
            .map_err(|e| BatchError::SourceUnavailable {
                identity: path.display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(BufReader::new(file)))
    }
}

/// Reads the object named by the `bucketName` and `fileName` parameters
#[derive(Clone)]
pub struct ObjectStoreSource {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreSource {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ItemSource for ObjectStoreSource {
    async fn open(&self, parameters: &JobParameters) -> BatchResult<ObjectReader> {
        let bucket = parameters
            .get_string(BUCKET_NAME)
            .ok_or_else(|| missing_parameter(BUCKET_NAME))?;
        let key = parameters
            .get_string(FILE_NAME)
            .ok_or_else(|| missing_parameter(FILE_NAME))?;

        self.store
            .get_object(bucket, key)
            .await
            .map_err(|e| BatchError::SourceUnavailable {
                identity: format!("s3://{}/{}", bucket, key),
                reason: e.to_string(),
            })
    }
}

fn missing_parameter(name: &str) -> BatchError {
    BatchError::SourceUnavailable {
        identity: "<unknown>".to_string(),
        reason: format!("job parameter '{}' is missing", name),
    }
}
