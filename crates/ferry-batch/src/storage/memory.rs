//! In-memory object store for tests

use async_trait::async_trait;
use dashmap::DashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{ObjectReader, ObjectStore};
use crate::error::{BatchError, BatchResult};

/// Object store kept in process memory
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<(String, String), Vec<u8>>,
    fail_deletes: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_object(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.value().clone())
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    /// Sorted keys stored in `bucket`
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|o| o.key().0 == bucket)
            .map(|o| o.key().1.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Make every following delete fail
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn missing(bucket: &str, key: &str) -> BatchError {
        BatchError::ObjectStore(format!("no such key: {}/{}", bucket, key))
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> BatchResult<ObjectReader> {
        let body = self.object(bucket, key).ok_or_else(|| Self::missing(bucket, key))?;
        Ok(Box::new(Cursor::new(body)))
    }

    async fn copy_object(
        &self,
        bucket: &str,
        source_key: &str,
        dest_key: &str,
    ) -> BatchResult<()> {
        let body = self
            .object(bucket, source_key)
            .ok_or_else(|| Self::missing(bucket, source_key))?;
        self.put_object(bucket, dest_key, body);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> BatchResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BatchError::ObjectStore(format!(
                "delete {}/{} refused",
                bucket, key
            )));
        }
        self.objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
