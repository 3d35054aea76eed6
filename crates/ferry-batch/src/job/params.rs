//! Job parameters identifying a single run

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

/// Local path of the input file (filesystem profile)
pub const FILE_PATH: &str = "filePath";
/// Bucket holding the input object (aws profile)
pub const BUCKET_NAME: &str = "bucketName";
/// File name, or object key for the aws profile
pub const FILE_NAME: &str = "fileName";
/// Trigger time in epoch milliseconds; distinguishes repeated runs of one file
pub const TIME: &str = "time";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobParameter {
    String(String),
    Long(i64),
}

impl fmt::Display for JobParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobParameter::String(s) => f.write_str(s),
            JobParameter::Long(n) => write!(f, "{}", n),
        }
    }
}

/// Immutable key/value map handed to a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParameters {
    values: BTreeMap<String, JobParameter>,
}

impl JobParameters {
    pub fn builder() -> JobParametersBuilder {
        JobParametersBuilder::default()
    }

    /// Parameters for a file detected on local disk
    pub fn for_local_file(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::builder()
            .add_string(FILE_NAME, file_name)
            .add_string(FILE_PATH, path.to_string_lossy())
            .add_long(TIME, next_trigger_time())
            .build()
    }

    /// Parameters for an object announced by a bucket notification
    pub fn for_object(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::builder()
            .add_string(FILE_NAME, key)
            .add_string(BUCKET_NAME, bucket)
            .add_long(TIME, next_trigger_time())
            .build()
    }

    pub fn get(&self, key: &str) -> Option<&JobParameter> {
        self.values.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(JobParameter::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_long(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(JobParameter::Long(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.get_string(FILE_NAME)
    }

    pub fn trigger_time(&self) -> Option<i64> {
        self.get_long(TIME)
    }

    /// `filePath` when present and not blank, otherwise `bucketName`
    pub fn source_identity(&self) -> Option<&str> {
        self.get_string(FILE_PATH)
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.get_string(BUCKET_NAME))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JobParameter)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for JobParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        f.write_str("}")
    }
}

#[derive(Debug, Default)]
pub struct JobParametersBuilder {
    values: BTreeMap<String, JobParameter>,
}

impl JobParametersBuilder {
    pub fn add_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values
            .insert(key.into(), JobParameter::String(value.into()));
        self
    }

    pub fn add_long(mut self, key: impl Into<String>, value: i64) -> Self {
        self.values.insert(key.into(), JobParameter::Long(value));
        self
    }

    pub fn build(self) -> JobParameters {
        JobParameters {
            values: self.values,
        }
    }
}

static LAST_TRIGGER_TIME: AtomicI64 = AtomicI64::new(0);

/// Wall-clock milliseconds, bumped so that no two triggers in this process share a value
pub fn next_trigger_time() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let mut last = LAST_TRIGGER_TIME.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_TRIGGER_TIME.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_local_file_parameters() {
        let params = JobParameters::for_local_file(&PathBuf::from("/data/input/people.csv"));
        assert_eq!(params.file_name(), Some("people.csv"));
        assert_eq!(params.get_string(FILE_PATH), Some("/data/input/people.csv"));
        assert_eq!(params.source_identity(), Some("/data/input/people.csv"));
        assert!(params.trigger_time().is_some());
    }

    #[test]
    fn test_object_parameters_use_bucket_as_identity() {
        let params = JobParameters::for_object("b", "incoming/k.csv");
        assert_eq!(params.source_identity(), Some("b"));
        assert_eq!(params.file_name(), Some("incoming/k.csv"));
    }

    #[test]
    fn test_blank_file_path_falls_back_to_bucket() {
        let params = JobParameters::builder()
            .add_string(FILE_PATH, "  ")
            .add_string(BUCKET_NAME, "bucket")
            .build();
        assert_eq!(params.source_identity(), Some("bucket"));
    }

    #[test]
    fn test_repeated_triggers_differ() {
        let first = JobParameters::for_object("b", "k");
        let second = JobParameters::for_object("b", "k");
        assert_ne!(first.trigger_time(), second.trigger_time());
        assert_ne!(first, second);
    }

    #[test]
    fn test_typed_getters_do_not_coerce() {
        let params = JobParameters::builder()
            .add_long(TIME, 42)
            .add_string(FILE_NAME, "a.csv")
            .build();
        assert_eq!(params.get_string(TIME), None);
        assert_eq!(params.get_long(FILE_NAME), None);
        assert_eq!(params.get_long(TIME), Some(42));
    }

    #[test]
    fn test_display_is_sorted() {
        let params = JobParameters::builder()
            .add_string(FILE_NAME, "a.csv")
            .add_long(TIME, 7)
            .add_string(BUCKET_NAME, "b")
            .build();
        assert_eq!(params.to_string(), "{bucketName=b, fileName=a.csv, time=7}");
    }
}
