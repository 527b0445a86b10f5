//! Export module - metadata selection, classification and report output.
//!
//! - **Traits**: [`ExportStage`], [`ReportWriter`] for building the pipeline
//! - **Filter**: entity/attribute selection via [`filter::select`]
//! - **Format**: attribute format classification via [`format::classify`]
//! - **Writer**: CSV output via [`writer::CsvReportWriter`]
//! - **Pipeline**: async executor via [`pipeline::ExportPipeline`]

pub mod filter;
pub mod format;
pub mod pipeline;
pub mod traits;
pub mod writer;

// Re-export commonly used types
pub use traits::{ExportStage, ReportWriter, SelectionCriteria, WriteError};

pub use filter::{select, select_with_stats, EntityFilter, Selection};
pub use format::{classify, render_options, FormatClassification};
pub use pipeline::{ExportPipeline, ExportResult, ExportStats, PipelineError};
pub use writer::CsvReportWriter;
