//! Record validation rules

use super::Record;
use crate::error::{BatchError, BatchResult};

/// Accepts a record (possibly transformed) or rejects it
pub trait RecordValidator: Send + Sync {
    fn validate(&self, record: Record, line_number: u64) -> BatchResult<Record>;
}

/// Rejects records whose name is longer than `max_name_length` characters
#[derive(Debug, Clone, Copy)]
pub struct NameLengthValidator {
    max_name_length: usize,
}

impl NameLengthValidator {
    pub const DEFAULT_MAX_NAME_LENGTH: usize = 10;

    pub fn new(max_name_length: usize) -> Self {
        Self { max_name_length }
    }
}

impl Default for NameLengthValidator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_NAME_LENGTH)
    }
}

impl RecordValidator for NameLengthValidator {
    fn validate(&self, record: Record, line_number: u64) -> BatchResult<Record> {
        let length = record.name.chars().count();
        if length > self.max_name_length {
            return Err(BatchError::RecordValidation {
                line: line_number,
                reason: format!(
                    "name '{}' is too long ({} > {})",
                    record.name, length, self.max_name_length
                ),
            });
        }
        Ok(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_names_up_to_limit_unchanged() {
        let validator = NameLengthValidator::default();
        for name in ["", "Al", "TenLetters"] {
            let record = Record::new(name, "NYC");
            assert_eq!(validator.validate(record.clone(), 1).unwrap(), record);
        }
    }

    #[test]
    fn test_rejects_names_over_limit() {
        let validator = NameLengthValidator::default();
        let err = validator
            .validate(Record::new("ThisNameIsWayTooLong", "City"), 1)
            .unwrap_err();
        assert!(matches!(err, BatchError::RecordValidation { line: 1, .. }));
        assert!(err.to_string().contains("20 > 10"));
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let validator = NameLengthValidator::new(4);
        assert!(validator.validate(Record::new("Zoë", "Köln"), 1).is_ok());
        assert!(validator.validate(Record::new("Zoëée", "Köln"), 1).is_err());
    }

    #[test]
    fn test_custom_limit() {
        let validator = NameLengthValidator::new(3);
        assert!(validator.validate(Record::new("Bob", "LA"), 2).is_ok());
        assert!(validator.validate(Record::new("Bobby", "LA"), 2).is_err());
    }
}
