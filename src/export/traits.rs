//! Core traits and types for the export pipeline.
//!
//! - Stage abstraction via [`ExportStage`]
//! - Selection parameters via [`SelectionCriteria`]
//! - Report output via [`ReportWriter`]

use std::path::PathBuf;

use thiserror::Error;

use crate::model::ReportRecord;

// ============================================================================
// Stage Trait
// ============================================================================

/// Generic pipeline stage that transforms Input → Output.
///
/// Implementations must be deterministic: the same input always produces the
/// same output, so a stage can be re-run safely.
pub trait ExportStage: Send + Sync {
    /// Input type consumed by this stage
    type Input;

    /// Output type produced by this stage
    type Output;

    /// Error type for stage failures
    type Error: std::error::Error + Send + Sync + 'static;

    /// Executes the stage.
    ///
    /// # Errors
    ///
    /// Returns `Err` if processing fails.
    fn execute(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;

    /// Returns a human-readable name for this stage, used in logs.
    fn stage_name(&self) -> &'static str;
}

// ============================================================================
// Selection
// ============================================================================

/// Which entities and attributes belong in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionCriteria {
    /// Publisher prefixes in priority order. A blank entry selects
    /// out-of-the-box entities.
    prefixes: Vec<String>,

    /// Keep non-custom entities matched by a non-blank prefix
    pub include_system_entities: bool,

    /// Emit only attributes owned by the prefix that matched their entity
    pub exclude_non_owned_attributes: bool,

    /// When `false`, standard audit columns (createdon, ownerid, ...) are skipped
    pub include_system_attributes: bool,
}

impl SelectionCriteria {
    /// Creates criteria with prefixes normalised: trimmed, trailing `_`
    /// removed, duplicates collapsed (first occurrence kept).
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalised: Vec<String> = Vec::new();
        for prefix in prefixes {
            let prefix = normalise_prefix(prefix.as_ref());
            if !normalised.iter().any(|p| p.eq_ignore_ascii_case(&prefix)) {
                normalised.push(prefix);
            }
        }

        Self {
            prefixes: normalised,
            include_system_entities: false,
            exclude_non_owned_attributes: false,
            include_system_attributes: true,
        }
    }

    pub fn with_system_entities(mut self, include: bool) -> Self {
        self.include_system_entities = include;
        self
    }

    pub fn with_owned_attributes_only(mut self, exclude_non_owned: bool) -> Self {
        self.exclude_non_owned_attributes = exclude_non_owned;
        self
    }

    pub fn with_system_attributes(mut self, include: bool) -> Self {
        self.include_system_attributes = include;
        self
    }

    /// Normalised prefixes in priority order.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Whether the blank (out-of-the-box) selector is part of the selection.
    pub fn selects_out_of_the_box(&self) -> bool {
        self.prefixes.iter().any(String::is_empty)
    }
}

fn normalise_prefix(raw: &str) -> String {
    raw.trim().trim_end_matches('_').to_string()
}

// ============================================================================
// Report Writer
// ============================================================================

/// Serialises report records to a destination.
///
/// Writers are synchronous; the pipeline runs them on a blocking task.
pub trait ReportWriter: Send + Sync {
    /// Writes the header and every record, returning the number of records written.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] if the destination cannot be created or written.
    /// A failed write may leave a truncated file behind.
    fn write(&self, records: &[ReportRecord]) -> Result<usize, WriteError>;

    /// Human-readable destination, used in logs.
    fn destination(&self) -> String;
}

/// Errors that can occur while writing the report.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Destination could not be created or written
    #[error("Failed to write report to '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV serialisation failed
    #[error("CSV error writing '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

// ============================================================================
// Tests
// ============================================================================
