//! Configuration management
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `ferry.toml` (or the file named by `FERRY_CONFIG`), then `FERRY_*`
//! environment variables using `__` between sections, e.g.
//! `FERRY_JOB__CHUNK_SIZE=25`.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::{DEFAULT_CHUNK_SIZE, DEFAULT_JOB_NAME};
use crate::record::{DelimitedRecordCodec, NameLengthValidator};
use crate::storage::config::DEFAULT_REGION;
use crate::storage::AwsSettings;
use crate::trigger::QueueListenerSettings;

/// Config file looked up when `FERRY_CONFIG` is unset; the extension is optional
pub const DEFAULT_CONFIG_FILE: &str = "ferry";

pub const DEFAULT_INPUT_DIR: &str = "./data/input";
pub const DEFAULT_ARCHIVE_DIR: &str = "./data/archive";
pub const DEFAULT_ERROR_DIR: &str = "./data/error";

pub const DEFAULT_WAIT_TIME_SECS: i32 = 20;
pub const DEFAULT_MAX_MESSAGES: i32 = 1;
pub const DEFAULT_ERROR_BACKOFF_SECS: u64 = 5;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Which trigger, source and archiver the binary wires up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Directory watch, local files, local archive directories
    Filesystem,
    /// Queue listener, S3 objects, S3 archive prefixes
    Aws,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub profile: Profile,
    pub job: JobConfig,
    pub record: RecordConfig,
    pub file: FileConfig,
    pub aws: AwsConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub chunk_size: usize,
    /// 0 disables skipping
    pub skip_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    pub delimiter: String,
    pub max_name_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub input_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub error_dir: PathBuf,
    /// Delay between detecting a file and reading it
    ///
    /// A run starts when the file is created. At 0, a file written in place
    /// can be read while still empty or partial and is then archived without
    /// the bytes that arrive later. Producers should write elsewhere and rename
    /// into `input_dir`, or set a delay longer than their writes take.
    pub settle_millis: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
    pub queue_name: String,
    pub wait_time_secs: i32,
    pub max_messages: i32,
    pub error_backoff_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Config {
    /// Load `.env`, the config file and the environment, then validate
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let path =
            std::env::var("FERRY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let config = Self::from_sources(&path)?;
        config.validate()?;

        Ok(config)
    }

    fn from_sources(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .set_default("profile", "filesystem")?
            .set_default("job.name", DEFAULT_JOB_NAME)?
            .set_default("job.chunk_size", DEFAULT_CHUNK_SIZE as u64)?
            .set_default("job.skip_limit", 0u64)?
            .set_default("record.delimiter", DelimitedRecordCodec::DEFAULT_DELIMITER)?
            .set_default("record.max_name_length", NameLengthValidator::DEFAULT_MAX_NAME_LENGTH as u64)?
            .set_default("file.input_dir", DEFAULT_INPUT_DIR)?
            .set_default("file.archive_dir", DEFAULT_ARCHIVE_DIR)?
            .set_default("file.error_dir", DEFAULT_ERROR_DIR)?
            .set_default("file.settle_millis", 0u64)?
            .set_default("aws.region", DEFAULT_REGION)?
            .set_default("aws.path_style", false)?
            .set_default("aws.queue_name", "")?
            .set_default("aws.wait_time_secs", DEFAULT_WAIT_TIME_SECS as i64)?
            .set_default("aws.max_messages", DEFAULT_MAX_MESSAGES as i64)?
            .set_default("aws.error_backoff_secs", DEFAULT_ERROR_BACKOFF_SECS)?
            .set_default("store.kind", "memory")?
            .set_default("store.max_connections", DEFAULT_MAX_CONNECTIONS as u64)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("FERRY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration (file: {})", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.job.name.trim().is_empty() {
            bail!("Job name cannot be empty");
        }

        if self.job.chunk_size == 0 {
            bail!("Chunk size must be greater than 0");
        }

        if self.record.delimiter.is_empty() {
            bail!("Record delimiter cannot be empty");
        }

        if self.record.max_name_length == 0 {
            bail!("Max name length must be greater than 0");
        }

        match self.profile {
            Profile::Filesystem => {
                if self.file.archive_dir == self.file.input_dir
                    || self.file.error_dir == self.file.input_dir
                {
                    bail!(
                        "Archive and error directories must differ from the input directory ({})",
                        self.file.input_dir.display()
                    );
                }
            },
            Profile::Aws => {
                if self.aws.queue_name.trim().is_empty() {
                    bail!("Queue name is required for the aws profile");
                }
                if self.aws.max_messages < 1 || self.aws.max_messages > 10 {
                    bail!(
                        "Max messages must be between 1 and 10, got {}",
                        self.aws.max_messages
                    );
                }
                if self.aws.wait_time_secs < 0 || self.aws.wait_time_secs > 20 {
                    bail!(
                        "Wait time must be between 0 and 20 seconds, got {}",
                        self.aws.wait_time_secs
                    );
                }
            },
        }

        if self.store.kind == StoreKind::Postgres {
            match &self.store.database_url {
                Some(url) if !url.trim().is_empty() => {},
                _ => bail!("Database URL is required for the postgres store"),
            }
            if self.store.max_connections == 0 {
                bail!("Database max_connections must be greater than 0");
            }
        }

        Ok(())
    }

    pub fn aws_settings(&self) -> AwsSettings {
        AwsSettings {
            region: self.aws.region.clone(),
            endpoint: self.aws.endpoint.clone(),
            access_key: self.aws.access_key.clone(),
            secret_key: self.aws.secret_key.clone(),
            path_style: self.aws.path_style,
        }
    }

    pub fn queue_settings(&self) -> QueueListenerSettings {
        QueueListenerSettings {
            queue_name: self.aws.queue_name.clone(),
            max_messages: self.aws.max_messages,
            wait_time_secs: self.aws.wait_time_secs,
            error_backoff: Duration::from_secs(self.aws.error_backoff_secs),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.file.settle_millis)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: Profile::Filesystem,
            job: JobConfig {
                name: DEFAULT_JOB_NAME.to_string(),
                chunk_size: DEFAULT_CHUNK_SIZE,
                skip_limit: 0,
            },
            record: RecordConfig {
                delimiter: DelimitedRecordCodec::DEFAULT_DELIMITER.to_string(),
                max_name_length: NameLengthValidator::DEFAULT_MAX_NAME_LENGTH,
            },
            file: FileConfig {
                input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
                archive_dir: PathBuf::from(DEFAULT_ARCHIVE_DIR),
                error_dir: PathBuf::from(DEFAULT_ERROR_DIR),
                settle_millis: 0,
            },
            aws: AwsConfig {
                region: DEFAULT_REGION.to_string(),
                endpoint: None,
                access_key: None,
                secret_key: None,
                path_style: false,
                queue_name: String::new(),
                wait_time_secs: DEFAULT_WAIT_TIME_SECS,
                max_messages: DEFAULT_MAX_MESSAGES,
                error_backoff_secs: DEFAULT_ERROR_BACKOFF_SECS,
            },
            store: StoreConfig {
                kind: StoreKind::Memory,
                database_url: None,
                max_connections: DEFAULT_MAX_CONNECTIONS,
            },
        }
    }
}
