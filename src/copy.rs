use crate::error::MigrateError;
use crate::source::RowSource;
use crate::writer::TargetWriter;
use log::debug;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Progress of one completed table copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub rows_written: usize,
    pub chunks_flushed: usize,
}

/// Drives a cursor to completion, delivering rows to the writer in batches of
/// at most `chunk_size`, in arrival order, each batch exactly once.
///
/// A flush happens the moment the buffer reaches `chunk_size` (the triggering
/// row included), and the trailing partial batch is always flushed after the
/// cursor is exhausted. Cancellation is observed before every row fetch and
/// every flush. Any read or write error ends the copy with no retry; chunks
/// flushed before the error stay committed in the target.
pub async fn copy_rows<S, W>(
    source: &mut S,
    writer: &mut W,
    chunk_size: usize,
    cancel: &CancellationToken,
) -> Result<CopyStats, MigrateError>
where
    S: RowSource + Send,
    W: TargetWriter + Send,
{
    if chunk_size == 0 {
        return Err(MigrateError::InvalidConfiguration(
            "chunk_size must be greater than zero".to_string(),
        ));
    }

    let mut stats = CopyStats::default();
    let mut batch: Vec<Vec<Value>> = Vec::with_capacity(chunk_size);

    loop {
        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }
        let Some(row) = source.next_row().await? else {
            break;
        };
        batch.push(row);

        if batch.len() >= chunk_size {
            // Handing the full buffer to the writer and starting a fresh one
            // is a single step; rows must never carry over into the next
            // chunk.
            let full = std::mem::replace(&mut batch, Vec::with_capacity(chunk_size));
            let columns = source.columns().to_vec();
            flush(columns, writer, full, cancel, &mut stats).await?;
        }
    }

    if !batch.is_empty() {
        let columns = source.columns().to_vec();
        flush(columns, writer, batch, cancel, &mut stats).await?;
    }

    Ok(stats)
}

// Takes the column list by value so the flush future borrows nothing from
// the source while the write is in flight.
async fn flush<W>(
    columns: Vec<String>,
    writer: &mut W,
    rows: Vec<Vec<Value>>,
    cancel: &CancellationToken,
    stats: &mut CopyStats,
) -> Result<(), MigrateError>
where
    W: TargetWriter + Send,
{
    if cancel.is_cancelled() {
        return Err(MigrateError::Cancelled);
    }
    let count = rows.len();
    writer.write_batch(&columns, rows).await?;
    stats.chunks_flushed += 1;
    stats.rows_written += count;
    debug!("flushed chunk {} ({} rows)", stats.chunks_flushed, count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;

    struct StubSource {
        columns: Vec<String>,
        rows: VecDeque<Vec<Value>>,
        fail_after: Option<u64>,
        served: u64,
    }

    impl StubSource {
        fn with_rows(count: usize) -> Self {
            let rows = (0..count)
                .map(|i| vec![json!(i as i64), json!(format!("name-{}", i))])
                .collect();
            Self {
                columns: vec!["id".to_string(), "name".to_string()],
                rows,
                fail_after: None,
                served: 0,
            }
        }

        fn failing_after(count: usize, rows_served: u64) -> Self {
            let mut source = Self::with_rows(count);
            source.fail_after = Some(rows_served);
            source
        }
    }

    #[async_trait]
    impl RowSource for StubSource {
        async fn next_row(&mut self) -> Result<Option<Vec<Value>>, MigrateError> {
            if self.fail_after == Some(self.served) {
                return Err(MigrateError::SourceRead {
                    row_index: self.served,
                    message: "connection reset".to_string(),
                });
            }
            match self.rows.pop_front() {
                Some(row) => {
                    self.served += 1;
                    Ok(Some(row))
                }
                None => Ok(None),
            }
        }

        fn columns(&self) -> &[String] {
            &self.columns
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        batches: Vec<Vec<Vec<Value>>>,
        columns_seen: Vec<Vec<String>>,
        fail_on_flush: Option<usize>,
    }

    #[async_trait]
    impl TargetWriter for RecordingWriter {
        async fn write_batch(
            &mut self,
            columns: &[String],
            rows: Vec<Vec<Value>>,
        ) -> Result<(), MigrateError> {
            if self.fail_on_flush == Some(self.batches.len() + 1) {
                return Err(MigrateError::TargetWrite(
                    "constraint violation".to_string(),
                ));
            }
            self.columns_seen.push(columns.to_vec());
            self.batches.push(rows);
            Ok(())
        }
    }

    #[tokio::test]
    async fn splits_rows_into_full_chunks_plus_trailing_partial() {
        let mut source = StubSource::with_rows(2500);
        let mut writer = RecordingWriter::default();
        let cancel = CancellationToken::new();

        let stats = copy_rows(&mut source, &mut writer, 1000, &cancel)
            .await
            .unwrap();

        assert_eq!(stats.chunks_flushed, 3);
        assert_eq!(stats.rows_written, 2500);
        let sizes: Vec<usize> = writer.batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
        for columns in &writer.columns_seen {
            assert_eq!(columns, &["id".to_string(), "name".to_string()]);
        }
    }

    #[tokio::test]
    async fn flushed_batches_concatenate_to_the_source_order() {
        let mut source = StubSource::with_rows(2500);
        let mut writer = RecordingWriter::default();
        let cancel = CancellationToken::new();

        copy_rows(&mut source, &mut writer, 1000, &cancel)
            .await
            .unwrap();

        let replayed: Vec<Vec<Value>> = writer.batches.into_iter().flatten().collect();
        assert_eq!(replayed.len(), 2500);
        for (index, row) in replayed.iter().enumerate() {
            assert_eq!(row[0], json!(index as i64));
        }
    }

    #[tokio::test]
    async fn empty_source_never_flushes() {
        let mut source = StubSource::with_rows(0);
        let mut writer = RecordingWriter::default();
        let cancel = CancellationToken::new();

        let stats = copy_rows(&mut source, &mut writer, 1000, &cancel)
            .await
            .unwrap();

        assert_eq!(stats, CopyStats::default());
        assert!(writer.batches.is_empty());
    }

    #[tokio::test]
    async fn exact_multiple_of_chunk_size_has_no_trailing_flush() {
        let mut source = StubSource::with_rows(2000);
        let mut writer = RecordingWriter::default();
        let cancel = CancellationToken::new();

        let stats = copy_rows(&mut source, &mut writer, 1000, &cancel)
            .await
            .unwrap();

        assert_eq!(stats.chunks_flushed, 2);
        assert_eq!(stats.rows_written, 2000);
    }

    #[tokio::test]
    async fn fewer_rows_than_chunk_size_still_flush_once() {
        let mut source = StubSource::with_rows(3);
        let mut writer = RecordingWriter::default();
        let cancel = CancellationToken::new();

        let stats = copy_rows(&mut source, &mut writer, 1000, &cancel)
            .await
            .unwrap();

        assert_eq!(stats.chunks_flushed, 1);
        assert_eq!(stats.rows_written, 3);
        assert_eq!(writer.batches[0].len(), 3);
    }

    #[tokio::test]
    async fn write_failure_stops_after_prior_chunks_are_committed() {
        let mut source = StubSource::with_rows(5000);
        let mut writer = RecordingWriter {
            fail_on_flush: Some(3),
            ..RecordingWriter::default()
        };
        let cancel = CancellationToken::new();

        let result = copy_rows(&mut source, &mut writer, 1000, &cancel).await;

        assert!(matches!(result, Err(MigrateError::TargetWrite(_))));
        assert_eq!(writer.batches.len(), 2);
        assert_eq!(
            writer.batches.iter().map(Vec::len).sum::<usize>(),
            2000
        );
    }

    #[tokio::test]
    async fn read_failure_reports_the_originating_row_index() {
        let mut source = StubSource::failing_after(100, 42);
        let mut writer = RecordingWriter::default();
        let cancel = CancellationToken::new();

        let result = copy_rows(&mut source, &mut writer, 10, &cancel).await;

        match result {
            Err(MigrateError::SourceRead { row_index, .. }) => assert_eq!(row_index, 42),
            other => panic!("expected SourceRead, got {:?}", other),
        }
        assert_eq!(writer.batches.len(), 4);
    }

    #[tokio::test]
    async fn zero_chunk_size_is_rejected_before_reading() {
        let mut source = StubSource::with_rows(10);
        let mut writer = RecordingWriter::default();
        let cancel = CancellationToken::new();

        let result = copy_rows(&mut source, &mut writer, 0, &cancel).await;

        assert!(matches!(
            result,
            Err(MigrateError::InvalidConfiguration(_))
        ));
        assert_eq!(source.served, 0);
    }

    #[tokio::test]
    async fn copy_runs_inside_a_spawned_task_with_a_send_only_source() {
        // A source that is Send but not Sync, like the boxed row stream the
        // production cursor wraps. Spawning forces the copy future to be
        // Send, so this test fails to compile if the loop ever holds a
        // shared source reference across a write await again.
        struct SendOnlySource {
            inner: StubSource,
            _not_sync: std::marker::PhantomData<std::cell::Cell<u8>>,
        }

        #[async_trait]
        impl RowSource for SendOnlySource {
            async fn next_row(&mut self) -> Result<Option<Vec<Value>>, MigrateError> {
                self.inner.next_row().await
            }

            fn columns(&self) -> &[String] {
                self.inner.columns()
            }
        }

        let handle = tokio::spawn(async move {
            let mut source = SendOnlySource {
                inner: StubSource::with_rows(10),
                _not_sync: std::marker::PhantomData,
            };
            let mut writer = RecordingWriter::default();
            let cancel = CancellationToken::new();
            copy_rows(&mut source, &mut writer, 4, &cancel).await
        });

        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.chunks_flushed, 3);
        assert_eq!(stats.rows_written, 10);
    }

    #[tokio::test]
    async fn cancellation_is_distinct_from_operational_failures() {
        let mut source = StubSource::with_rows(10);
        let mut writer = RecordingWriter::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = copy_rows(&mut source, &mut writer, 5, &cancel).await;

        assert!(matches!(result, Err(MigrateError::Cancelled)));
        assert!(writer.batches.is_empty());
    }
}
