//! Records read from input files
//!
//! - **codec**: turns one delimited line into a [`Record`]
//! - **validator**: business rules a record must pass before it is persisted

pub mod codec;
pub mod validator;

pub use codec::{DelimitedRecordCodec, LineMapper};
pub use validator::{NameLengthValidator, RecordValidator};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One accepted input line
///
/// `id`, `created_at` and `updated_at` stay empty until a record store
/// persists the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: Option<Uuid>,
    pub name: String,
    pub city: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(name: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            city: city.into(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Stamp identity and timestamps the way a store does on insert
    pub fn mark_persisted(&mut self, now: DateTime<Utc>) {
        if self.id.is_none() {
            self.id = Some(Uuid::new_v4());
        }
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.updated_at = Some(now);
    }
}
