//! Delimited line decoding

use super::Record;
use crate::error::{BatchError, BatchResult};

/// Maps one raw input line to a [`Record`]
pub trait LineMapper: Send + Sync {
    /// `line_number` is 1-based and only used for error reporting
    fn map_line(&self, line: &str, line_number: u64) -> BatchResult<Record>;
}

/// `name<delimiter>city` lines
///
/// The first two fields are taken verbatim; any further fields are ignored.
/// A trailing carriage return is dropped so CRLF files decode the same as LF.
#[derive(Debug, Clone)]
pub struct DelimitedRecordCodec {
    delimiter: String,
}

impl DelimitedRecordCodec {
    pub const DEFAULT_DELIMITER: &'static str = ",";

    pub fn new(delimiter: impl Into<String>) -> BatchResult<Self> {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Err(BatchError::Config("record delimiter cannot be empty".to_string()));
        }
        Ok(Self { delimiter })
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }
}

impl Default for DelimitedRecordCodec {
    fn default() -> Self {
        Self {
            delimiter: Self::DEFAULT_DELIMITER.to_string(),
        }
    }
}

impl LineMapper for DelimitedRecordCodec {
    fn map_line(&self, line: &str, line_number: u64) -> BatchResult<Record> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let mut fields = line.split(self.delimiter.as_str());

        match (fields.next(), fields.next()) {
            (Some(name), Some(city)) => Ok(Record::new(name, city)),
            _ => Err(BatchError::RecordDecode {
                line: line_number,
                input: line.to_string(),
                reason: format!("expected 2 fields separated by '{}'", self.delimiter),
            }),
        }
    }
}
