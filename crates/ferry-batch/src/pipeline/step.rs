//! Chunk-oriented read, validate, write step

use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::{debug, instrument, warn};

use super::sink::RecordStore;
use super::skip::SkipPolicy;
use crate::error::{BatchError, BatchResult};
use crate::job::StepExecution;
use crate::record::{LineMapper, Record, RecordValidator};
use crate::storage::ObjectReader;

pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Accepted records waiting to be flushed as one unit
#[derive(Debug)]
pub struct Chunk {
    items: Vec<Record>,
    capacity: usize,
}

impl Chunk {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: Record) {
        self.items.push(record);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    fn take(&mut self) -> Vec<Record> {
        std::mem::replace(&mut self.items, Vec::with_capacity(self.capacity))
    }
}

/// Reads lines, decodes and validates each one, and flushes accepted records
/// to the store every `chunk_size` records
pub struct ChunkStep {
    chunk_size: usize,
    mapper: Arc<dyn LineMapper>,
    validator: Arc<dyn RecordValidator>,
    skip_policy: Arc<dyn SkipPolicy>,
    store: Arc<dyn RecordStore>,
}

impl ChunkStep {
    pub fn new(
        chunk_size: usize,
        mapper: Arc<dyn LineMapper>,
        validator: Arc<dyn RecordValidator>,
        skip_policy: Arc<dyn SkipPolicy>,
        store: Arc<dyn RecordStore>,
    ) -> BatchResult<Self> {
        if chunk_size == 0 {
            return Err(BatchError::Config("chunk size must be greater than 0".to_string()));
        }
        Ok(Self {
            chunk_size,
            mapper,
            validator,
            skip_policy,
            store,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Drain `reader`, updating the counters in `step`
    ///
    /// Every line read is decoded, blank ones included. The first failure the
    /// skip policy does not absorb ends the step. Records of the chunk in
    /// progress at that point are discarded; chunks flushed earlier stay
    /// persisted.
    #[instrument(skip_all, fields(step = %step.step_name, chunk_size = self.chunk_size))]
    pub async fn execute(
        &self,
        mut reader: ObjectReader,
        step: &mut StepExecution,
    ) -> BatchResult<()> {
        let mut chunk = Chunk::new(self.chunk_size);
        let mut buf = Vec::new();
        let mut line_number: u64 = 0;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|e| BatchError::SourceUnavailable {
                    identity: format!("line {}", line_number + 1),
                    reason: format!("read failed: {}", e),
                })?;
            if read == 0 {
                break;
            }
            line_number += 1;
            step.read_count += 1;

            let raw = buf.strip_suffix(b"\n").unwrap_or(&buf);
            match self.process_line(raw, line_number) {
                Ok(record) => chunk.push(record),
                Err(failure) => {
                    if self.skip_policy.should_skip(&failure, step.skip_count) {
                        step.skip_count += 1;
                        warn!(line = line_number, error = %failure, "Skipping record");
                        continue;
                    }
                    return Err(failure);
                },
            }

            if chunk.is_full() {
                self.flush(&mut chunk, step).await?;
            }
        }

        if !chunk.is_empty() {
            self.flush(&mut chunk, step).await?;
        }

        Ok(())
    }

    fn process_line(&self, raw: &[u8], line_number: u64) -> BatchResult<Record> {
        let line = std::str::from_utf8(raw).map_err(|e| BatchError::RecordDecode {
            line: line_number,
            input: String::from_utf8_lossy(raw).into_owned(),
            reason: format!("invalid UTF-8: {}", e),
        })?;
        let record = self.mapper.map_line(line, line_number)?;
        self.validator.validate(record, line_number)
    }

    async fn flush(&self, chunk: &mut Chunk, step: &mut StepExecution) -> BatchResult<()> {
        let number = step.commit_count + 1;
        let items = chunk.take();
        let count = items.len() as u64;

        self.store
            .save_all(items)
            .await
            .map_err(|e| BatchError::SinkFailure {
                chunk: number,
                reason: format!("{:#}", e),
            })?;

        step.commit_count += 1;
        step.write_count += count;
        debug!(chunk = number, count, "Chunk flushed");

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pipeline::sink::InMemoryRecordStore;
    use crate::pipeline::skip::{policy_for_limit, LimitSkipPolicy, NeverSkipPolicy};
    use crate::record::{DelimitedRecordCodec, NameLengthValidator};
    use std::io::Cursor;

    fn step_with(
        chunk_size: usize,
        skip_policy: Arc<dyn SkipPolicy>,
        store: Arc<InMemoryRecordStore>,
    ) -> ChunkStep {
        ChunkStep::new(
            chunk_size,
            Arc::new(DelimitedRecordCodec::default()),
            Arc::new(NameLengthValidator::default()),
            skip_policy,
            store,
        )
        .unwrap()
    }

    fn reader(content: &str) -> ObjectReader {
        Box::new(Cursor::new(content.as_bytes().to_vec()))
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let result = ChunkStep::new(
            0,
            Arc::new(DelimitedRecordCodec::default()),
            Arc::new(NameLengthValidator::default()),
            Arc::new(NeverSkipPolicy),
            Arc::new(InMemoryRecordStore::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_chunk_fills_at_capacity() {
        let mut chunk = Chunk::new(2);
        chunk.push(Record::new("a", "b"));
        assert!(!chunk.is_full());
        chunk.push(Record::new("c", "d"));
        assert!(chunk.is_full());
        assert_eq!(chunk.take().len(), 2);
        assert!(chunk.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_count_matches_ceiling() {
        for (n, c) in [(0usize, 3usize), (1, 3), (3, 3), (7, 3), (10, 10), (25, 10), (5, 1)] {
            let store = Arc::new(InMemoryRecordStore::new());
            let step = step_with(c, Arc::new(NeverSkipPolicy), store.clone());
            let content: String = (0..n).map(|i| format!("n{},city{}\n", i, i)).collect();

            let mut stats = StepExecution::new("test");
            step.execute(reader(&content), &mut stats).await.unwrap();

            let sizes = store.call_sizes().await;
            assert_eq!(sizes.len(), n.div_ceil(c), "n={} c={}", n, c);
            assert!(sizes.iter().all(|s| *s <= c));
            assert_eq!(sizes.iter().sum::<usize>(), n);
            assert_eq!(stats.write_count, n as u64);
            assert_eq!(stats.read_count, n as u64);
        }
    }

    #[tokio::test]
    async fn test_failure_discards_open_chunk() {
        let store = Arc::new(InMemoryRecordStore::new());
        let step = step_with(2, Arc::new(NeverSkipPolicy), store.clone());
        let content = "a,1\nb,2\nc,3\nThisNameIsWayTooLong,4\n";

        let mut stats = StepExecution::new("test");
        let err = step.execute(reader(content), &mut stats).await.unwrap_err();

        assert!(matches!(err, BatchError::RecordValidation { line: 4, .. }));
        // first chunk persisted, "c" was pending and is dropped
        assert_eq!(store.call_sizes().await, vec![2]);
        assert_eq!(stats.commit_count, 1);
    }

    #[tokio::test]
    async fn test_limit_policy_skips_bad_records() {
        let store = Arc::new(InMemoryRecordStore::new());
        let step = step_with(10, Arc::new(LimitSkipPolicy::new(2)), store.clone());
        let content = "Alice,NYC\nbroken\nThisNameIsWayTooLong,X\nBob,LA\n";

        let mut stats = StepExecution::new("test");
        step.execute(reader(content), &mut stats).await.unwrap();

        let names: Vec<String> = store.records().await.into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert_eq!(stats.skip_count, 2);
        assert_eq!(stats.read_count, 4);
    }

    #[tokio::test]
    async fn test_limit_policy_skips_invalid_utf8_line() {
        let store = Arc::new(InMemoryRecordStore::new());
        let step = step_with(10, policy_for_limit(5), store.clone());
        let content = b"Alice,NYC\n\xff\xfe,LA\nBob,LA\n".to_vec();

        let mut stats = StepExecution::new("test");
        step.execute(Box::new(Cursor::new(content)), &mut stats)
            .await
            .unwrap();

        let names: Vec<String> = store.records().await.into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert_eq!(stats.skip_count, 1);
        assert_eq!(stats.read_count, 3);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_decode_error() {
        let store = Arc::new(InMemoryRecordStore::new());
        let step = step_with(10, Arc::new(NeverSkipPolicy), store.clone());
        let content = b"Alice,NYC\n\xff\xfe,LA\n".to_vec();

        let mut stats = StepExecution::new("test");
        let err = step
            .execute(Box::new(Cursor::new(content)), &mut stats)
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::RecordDecode { line: 2, .. }));
        assert!(err.is_record_level());
        assert!(store.call_sizes().await.is_empty());
    }

    #[tokio::test]
    async fn test_blank_line_fails_decoding() {
        let store = Arc::new(InMemoryRecordStore::new());
        let step = step_with(10, Arc::new(NeverSkipPolicy), store.clone());

        let mut stats = StepExecution::new("test");
        let err = step
            .execute(reader("Alice,NYC\n   \n\nBob,LA\n"), &mut stats)
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::RecordDecode { line: 2, .. }));
        assert_eq!(stats.read_count, 2);
        assert!(store.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_blank_lines_count_against_skip_limit() {
        let store = Arc::new(InMemoryRecordStore::new());
        let step = step_with(10, Arc::new(LimitSkipPolicy::new(2)), store.clone());

        let mut stats = StepExecution::new("test");
        step.execute(reader("Alice,NYC\n   \n\r\nBob,LA"), &mut stats)
            .await
            .unwrap();

        assert_eq!(store.records().await.len(), 2);
        assert_eq!(stats.read_count, 4);
        assert_eq!(stats.skip_count, 2);
    }
}
