//! Record stores that receive flushed chunks

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::record::Record;

/// Bulk upsert of accepted records
///
/// One call persists one chunk. Implementations must be all-or-nothing per
/// call: either every record is stored or none is.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns the records as stored (id and timestamps filled in)
    async fn save_all(&self, records: Vec<Record>) -> Result<Vec<Record>>;
}

#[derive(Default)]
struct MemoryState {
    records: Vec<Record>,
    call_sizes: Vec<usize>,
}

/// Keeps records in process memory
#[derive(Default)]
pub struct InMemoryRecordStore {
    state: Mutex<MemoryState>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<Record> {
        self.state.lock().await.records.clone()
    }

    /// Number of records passed to each `save_all` call, in call order
    pub async fn call_sizes(&self) -> Vec<usize> {
        self.state.lock().await.call_sizes.clone()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn save_all(&self, mut records: Vec<Record>) -> Result<Vec<Record>> {
        let now = Utc::now();
        for record in &mut records {
            record.mark_persisted(now);
        }

        let mut state = self.state.lock().await;
        state.call_sizes.push(records.len());
        state.records.extend(records.iter().cloned());
        Ok(records)
    }
}

/// Postgres-backed store; each chunk is written in one transaction
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .context("Failed to connect to record database")?;

        info!("Record database connection pool established");
        Ok(Self::new(pool))
    }

    /// Create the `records` table if it does not exist
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run record store migrations")?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn save_all(&self, mut records: Vec<Record>) -> Result<Vec<Record>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start transaction")?;

        let now = Utc::now();
        for record in &mut records {
            record.mark_persisted(now);

            sqlx::query(
                r#"
                INSERT INTO records (id, name, city, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name,
                    city = EXCLUDED.city,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(record.id)
            .bind(&record.name)
            .bind(&record.city)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&mut *tx)
            .await
            .context("Failed to insert record")?;
        }

        tx.commit().await.context("Failed to commit transaction")?;
        debug!("Stored {} records", records.len());

        Ok(records)
    }
}
