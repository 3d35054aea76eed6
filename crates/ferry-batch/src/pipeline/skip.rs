//! Skip policies for record-level failures

use std::sync::Arc;

use crate::error::BatchError;

/// Decides whether a failed record is skipped or aborts the run
///
/// `skip_count` is the number of records already skipped in this run.
pub trait SkipPolicy: Send + Sync {
    fn should_skip(&self, failure: &BatchError, skip_count: u64) -> bool;
}

/// Every record-level failure aborts the run
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSkipPolicy;

impl SkipPolicy for NeverSkipPolicy {
    fn should_skip(&self, _failure: &BatchError, _skip_count: u64) -> bool {
        false
    }
}

/// Skips up to `limit` decode or validation failures per run
#[derive(Debug, Clone, Copy)]
pub struct LimitSkipPolicy {
    limit: u64,
}

impl LimitSkipPolicy {
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }
}

impl SkipPolicy for LimitSkipPolicy {
    fn should_skip(&self, failure: &BatchError, skip_count: u64) -> bool {
        failure.is_record_level() && skip_count < self.limit
    }
}

/// `0` means never skip
pub fn policy_for_limit(skip_limit: u64) -> Arc<dyn SkipPolicy> {
    if skip_limit == 0 {
        Arc::new(NeverSkipPolicy)
    } else {
        Arc::new(LimitSkipPolicy::new(skip_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation_failure() -> BatchError {
        BatchError::RecordValidation {
            line: 1,
            reason: "too long".to_string(),
        }
    }

    #[test]
    fn test_never_skip() {
        assert!(!NeverSkipPolicy.should_skip(&validation_failure(), 0));
    }

    #[test]
    fn test_limit_skip_stops_at_limit() {
        let policy = LimitSkipPolicy::new(2);
        assert!(policy.should_skip(&validation_failure(), 0));
        assert!(policy.should_skip(&validation_failure(), 1));
        assert!(!policy.should_skip(&validation_failure(), 2));
    }

    #[test]
    fn test_limit_skip_never_skips_fatal_errors() {
        let policy = LimitSkipPolicy::new(100);
        let sink = BatchError::SinkFailure {
            chunk: 1,
            reason: "down".to_string(),
        };
        assert!(!policy.should_skip(&sink, 0));
    }

    #[test]
    fn test_policy_for_limit() {
        assert!(!policy_for_limit(0).should_skip(&validation_failure(), 0));
        assert!(policy_for_limit(1).should_skip(&validation_failure(), 0));
    }
}
