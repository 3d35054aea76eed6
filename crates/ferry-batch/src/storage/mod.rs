//! Object store access
//!
//! The pipeline and the remote archiver only need three calls, captured by
//! [`ObjectStore`]. [`S3ObjectStore`] talks to S3 (or an S3-compatible
//! endpoint); [`memory::InMemoryObjectStore`] backs tests.

use async_trait::async_trait;
use aws_sdk_s3::{error::DisplayErrorContext, Client};
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{debug, info, instrument};

use crate::error::{BatchError, BatchResult};

pub mod config;
pub mod memory;

pub use config::AwsSettings;
pub use memory::InMemoryObjectStore;

/// Buffered reader over an object's bytes
pub type ObjectReader = Box<dyn AsyncBufRead + Send + Unpin>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> BatchResult<ObjectReader>;

    /// Copy `source_key` to `dest_key` inside the same bucket
    async fn copy_object(&self, bucket: &str, source_key: &str, dest_key: &str)
        -> BatchResult<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> BatchResult<()>;
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn from_settings(settings: &AwsSettings) -> Self {
        let sdk_config = settings.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.path_style)
            .build();

        info!(
            region = %settings.region,
            endpoint = ?settings.endpoint,
            "S3 client initialized"
        );

        Self::new(Client::from_conf(s3_config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> BatchResult<ObjectReader> {
        debug!("Opening s3://{}/{}", bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                BatchError::ObjectStore(format!(
                    "get s3://{}/{}: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(Box::new(BufReader::new(response.body.into_async_read())))
    }

    #[instrument(skip(self))]
    async fn copy_object(
        &self,
        bucket: &str,
        source_key: &str,
        dest_key: &str,
    ) -> BatchResult<()> {
        let copy_source = format!("{}/{}", bucket, source_key);

        self.client
            .copy_object()
            .bucket(bucket)
            .copy_source(&copy_source)
            .key(dest_key)
            .send()
            .await
            .map_err(|e| {
                BatchError::ObjectStore(format!(
                    "copy s3://{} to {}: {}",
                    copy_source,
                    dest_key,
                    DisplayErrorContext(&e)
                ))
            })?;

        debug!("Copied s3://{} to s3://{}/{}", copy_source, bucket, dest_key);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, bucket: &str, key: &str) -> BatchResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                BatchError::ObjectStore(format!(
                    "delete s3://{}/{}: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        debug!("Deleted s3://{}/{}", bucket, key);
        Ok(())
    }
}
