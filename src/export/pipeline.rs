//! Export pipeline executor.
//!
//! [`ExportPipeline`] runs the export stages in order
//! (Retrieval → Selection → Write) with:
//! - Async execution via `tokio`
//! - A configurable retrieval timeout (the report write is not bounded)
//! - Structured logging via `tracing`

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{info, warn};

use crate::export::filter::EntityFilter;
use crate::export::traits::{ExportStage, ReportWriter, SelectionCriteria, WriteError};
use crate::model::ReportRecord;
use crate::traits::{MetadataSource, SourceError};

// ============================================================================
// Pipeline Types
// ============================================================================

/// Complete export result with records and statistics.
#[derive(Debug)]
pub struct ExportResult {
    /// Records selected for the report, in output order
    pub records: Vec<ReportRecord>,

    /// Report destination.
    ///
    /// `None` when nothing was selected; no file is created in that case.
    pub output: Option<String>,

    /// Timing and volume statistics
    pub stats: ExportStats,
}

/// Statistics about the export run.
#[derive(Debug, Default, Clone)]
pub struct ExportStats {
    /// Total time spent on the whole export (milliseconds)
    pub total_duration_ms: u64,

    /// Time spent retrieving metadata (milliseconds)
    pub retrieval_duration_ms: u64,

    /// Time spent selecting records (milliseconds)
    pub selection_duration_ms: u64,

    /// Time spent writing the report (milliseconds)
    pub write_duration_ms: u64,

    /// Entities returned by the source
    pub entities_scanned: usize,

    /// Entities that passed the entity filter
    pub entities_selected: usize,

    /// Records written to the report
    pub records_written: usize,
}

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors that can occur during pipeline execution.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Stage execution exceeded timeout
    #[error("Stage '{stage}' timed out after {timeout_secs}s")]
    StageTimeout { stage: String, timeout_secs: u64 },

    /// Metadata could not be retrieved
    #[error("Metadata retrieval failed: {0}")]
    Retrieval(#[from] SourceError),

    /// Report could not be written
    #[error("Report write failed: {0}")]
    Write(#[from] WriteError),

    /// Blocking task panicked or was cancelled
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Export pipeline with async execution and timeout support.
///
/// # Example
///
/// ```ignore
/// use dataverse_attribute_exporter::export::{CsvReportWriter, ExportPipeline, SelectionCriteria};
/// use dataverse_attribute_exporter::source::SnapshotSource;
///
/// let pipeline = ExportPipeline::new(
///     SnapshotSource::new("metadata.json"),
///     CsvReportWriter::new("attributes.csv"),
/// );
/// let result = pipeline.execute(&SelectionCriteria::new(["contoso"])).await?;
/// println!("Exported {} attributes", result.stats.records_written);
/// ```
pub struct ExportPipeline<S, W>
where
    S: MetadataSource,
    W: ReportWriter + 'static,
{
    /// Metadata source
    source: S,

    /// Report destination, shared with the blocking write task
    writer: Arc<W>,

    /// Timeout for the retrieval stage (default: 5 minutes)
    retrieval_timeout: Duration,
}

impl<S, W> ExportPipeline<S, W>
where
    S: MetadataSource,
    W: ReportWriter + 'static,
{
    /// Creates a new pipeline with a 5 minute retrieval timeout.
    pub fn new(source: S, writer: W) -> Self {
        Self {
            source,
            writer: Arc::new(writer),
            retrieval_timeout: Duration::from_secs(300),
        }
    }

    /// Sets the retrieval timeout.
    ///
    /// The write stage is not bounded: a blocking write cannot be cancelled,
    /// so it is always awaited.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.retrieval_timeout = timeout;
        self
    }

    /// Runs retrieval, selection and write.
    ///
    /// An empty selection is a valid outcome: a warning is logged, no file is
    /// written and the result carries zero records.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if:
    /// - Retrieval times out
    /// - The metadata source fails
    /// - The report cannot be written (a partial file may remain)
    pub async fn execute(&self, criteria: &SelectionCriteria) -> Result<ExportResult, PipelineError> {
        let start = Instant::now();
        let mut stats = ExportStats::default();

        // ====================================================================
        // Stage 1: Retrieval
        // ====================================================================

        info!(source = self.source.source_id(), "Starting retrieval stage");
        let retrieval_start = Instant::now();

        let entities = timeout(self.retrieval_timeout, self.source.retrieve_all_entities())
            .await
            .map_err(|_| self.timeout_error("retrieval"))??;

        stats.retrieval_duration_ms = elapsed_ms(retrieval_start);
        info!(
            duration_ms = stats.retrieval_duration_ms,
            entities = entities.len(),
            "Retrieval completed"
        );

        // ====================================================================
        // Stage 2: Selection
        // ====================================================================

        let filter = EntityFilter::new(criteria.clone());
        info!(stage = filter.stage_name(), "Starting selection stage");
        let selection_start = Instant::now();

        let selection = match filter.execute(entities) {
            Ok(selection) => selection,
            Err(never) => match never {},
        };

        stats.selection_duration_ms = elapsed_ms(selection_start);
        stats.entities_scanned = selection.entities_scanned;
        stats.entities_selected = selection.entities_selected;

        if selection.records.is_empty() {
            warn!(
                prefixes = ?criteria.prefixes(),
                "No attributes found for the selected publisher prefixes"
            );
            stats.total_duration_ms = elapsed_ms(start);
            return Ok(ExportResult {
                records: selection.records,
                output: None,
                stats,
            });
        }

        // ====================================================================
        // Stage 3: Write
        // ====================================================================

        let destination = self.writer.destination();
        info!(
            records = selection.records.len(),
            destination = %destination,
            "Starting write stage"
        );
        let write_start = Instant::now();

        let writer = Arc::clone(&self.writer);
        let records = selection.records;
        let (records, written) = tokio::task::spawn_blocking(move || {
            let written = writer.write(&records);
            (records, written)
        })
        .await?;

        stats.records_written = written?;
        stats.write_duration_ms = elapsed_ms(write_start);
        stats.total_duration_ms = elapsed_ms(start);

        info!(
            duration_ms = stats.write_duration_ms,
            records = stats.records_written,
            total_ms = stats.total_duration_ms,
            "Write completed"
        );

        Ok(ExportResult {
            records,
            output: Some(destination),
            stats,
        })
    }

    fn timeout_error(&self, stage: &str) -> PipelineError {
        PipelineError::StageTimeout {
            stage: stage.to_string(),
            timeout_secs: self.retrieval_timeout.as_secs(),
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeDescriptor, AttributeKind, EntityDescriptor};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockSource {
        entities: Vec<EntityDescriptor>,
        delay: Duration,
    }

    impl MockSource {
        fn new(entities: Vec<EntityDescriptor>) -> Self {
            Self {
                entities,
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl MetadataSource for MockSource {
        fn source_id(&self) -> &str {
            "mock"
        }

        async fn retrieve_all_entities(&self) -> Result<Vec<EntityDescriptor>, SourceError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.entities.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl MetadataSource for FailingSource {
        fn source_id(&self) -> &str {
            "failing"
        }

        async fn retrieve_all_entities(&self) -> Result<Vec<EntityDescriptor>, SourceError> {
            Err(SourceError::UnsupportedConnection("offline".to_string()))
        }
    }

    #[derive(Default)]
    struct MemoryWriter {
        written: Mutex<Vec<ReportRecord>>,
    }

    impl ReportWriter for MemoryWriter {
        fn write(&self, records: &[ReportRecord]) -> Result<usize, WriteError> {
            let mut written = self.written.lock().unwrap();
            written.extend_from_slice(records);
            Ok(records.len())
        }

        fn destination(&self) -> String {
            "memory".to_string()
        }
    }

    struct FailingWriter;

    impl ReportWriter for FailingWriter {
        fn write(&self, _records: &[ReportRecord]) -> Result<usize, WriteError> {
            Err(WriteError::Io {
                path: "/readonly/report.csv".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }

        fn destination(&self) -> String {
            "/readonly/report.csv".to_string()
        }
    }

    struct SlowWriter {
        delay: Duration,
        inner: MemoryWriter,
    }

    impl ReportWriter for SlowWriter {
        fn write(&self, records: &[ReportRecord]) -> Result<usize, WriteError> {
            std::thread::sleep(self.delay);
            self.inner.write(records)
        }

        fn destination(&self) -> String {
            "slow".to_string()
        }
    }

    fn invoice() -> EntityDescriptor {
        EntityDescriptor {
            schema_name: "contoso_invoice".to_string(),
            display_label: Some("Invoice".to_string()),
            is_custom: true,
            attributes: vec![
                AttributeDescriptor::new("contoso_amount", AttributeKind::Money),
                AttributeDescriptor::new("createdon", AttributeKind::DateTime { format: None }),
            ],
        }
    }

    #[tokio::test]
    async fn test_pipeline_execution() {
        let pipeline = ExportPipeline::new(MockSource::new(vec![invoice()]), MemoryWriter::default());

        let result = pipeline
            .execute(&SelectionCriteria::new(["contoso"]))
            .await
            .unwrap();

        assert_eq!(result.records.len(), 2);
        assert_eq!(result.output.as_deref(), Some("memory"));
        assert_eq!(result.stats.entities_scanned, 1);
        assert_eq!(result.stats.entities_selected, 1);
        assert_eq!(result.stats.records_written, 2);
        assert_eq!(pipeline.writer.written.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_selection_skips_write() {
        let pipeline = ExportPipeline::new(MockSource::new(vec![invoice()]), FailingWriter);

        let result = pipeline
            .execute(&SelectionCriteria::new(["fabrikam"]))
            .await
            .unwrap();

        assert!(result.records.is_empty());
        assert!(result.output.is_none());
        assert_eq!(result.stats.records_written, 0);
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let pipeline = ExportPipeline::new(FailingSource, MemoryWriter::default());

        let err = pipeline
            .execute(&SelectionCriteria::new(["contoso"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Retrieval(_)));
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let pipeline = ExportPipeline::new(MockSource::new(vec![invoice()]), FailingWriter);

        let err = pipeline
            .execute(&SelectionCriteria::new(["contoso"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Write(WriteError::Io { .. })));
    }

    #[tokio::test]
    async fn test_retrieval_timeout() {
        let source = MockSource {
            entities: vec![invoice()],
            delay: Duration::from_secs(5),
        };
        let pipeline = ExportPipeline::new(source, MemoryWriter::default())
            .with_timeout(Duration::from_millis(20));

        let err = pipeline
            .execute(&SelectionCriteria::new(["contoso"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::StageTimeout { ref stage, .. } if stage == "retrieval"));
    }

    #[tokio::test]
    async fn test_slow_write_outlasting_timeout_completes() {
        let writer = SlowWriter {
            delay: Duration::from_millis(100),
            inner: MemoryWriter::default(),
        };
        let pipeline = ExportPipeline::new(MockSource::new(vec![invoice()]), writer)
            .with_timeout(Duration::from_millis(20));

        let result = pipeline
            .execute(&SelectionCriteria::new(["contoso"]))
            .await
            .unwrap();

        assert_eq!(result.output.as_deref(), Some("slow"));
        assert_eq!(result.stats.records_written, 2);
        assert_eq!(pipeline.writer.inner.written.lock().unwrap().len(), 2);
    }
}
