//! CSV report writer.

use std::path::{Path, PathBuf};

use csv::{QuoteStyle, WriterBuilder};
use tracing::{info, instrument};

use crate::export::traits::{ReportWriter, WriteError};
use crate::model::{ReportRecord, REPORT_HEADERS};

/// Writes report records as comma-separated text with a fixed header row.
#[derive(Debug, Clone)]
pub struct CsvReportWriter {
    path: PathBuf,
}

impl CsvReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> WriteError {
        WriteError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_error(&self, source: csv::Error) -> WriteError {
        WriteError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

impl ReportWriter for CsvReportWriter {
    #[instrument(skip_all, fields(path = %self.path.display(), records = records.len()))]
    fn write(&self, records: &[ReportRecord]) -> Result<usize, WriteError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        // Header is written by hand so it is present even for an empty record set.
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .delimiter(b',')
            .quote(b'"')
            .double_quote(true)
            .quote_style(QuoteStyle::Necessary)
            .from_path(&self.path)
            .map_err(|e| self.csv_error(e))?;

        writer
            .write_record(REPORT_HEADERS)
            .map_err(|e| self.csv_error(e))?;
        for record in records {
            writer.serialize(record).map_err(|e| self.csv_error(e))?;
        }
        writer.flush().map_err(|e| self.io_error(e))?;

        info!("Report written");
        Ok(records.len())
    }

    fn destination(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "report_{}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos(),
            name
        ))
    }

    fn record(description: &str) -> ReportRecord {
        ReportRecord {
            entity_schema_name: "contoso_invoice".to_string(),
            entity_display_name: "Invoice".to_string(),
            attribute_schema_name: "contoso_amount".to_string(),
            attribute_display_name: "Amount".to_string(),
            attribute_type: "Money".to_string(),
            dataverse_format: "Money".to_string(),
            format_details: "Currency".to_string(),
            attribute_description: description.to_string(),
            publisher_prefix: "contoso".to_string(),
        }
    }

    #[test]
    fn test_writes_header_and_rows() {
        let path = temp_path("rows.csv");
        let writer = CsvReportWriter::new(&path);

        let written = writer
            .write(&[record("Total, incl. \"tax\"")])
            .unwrap();
        assert_eq!(written, 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some(
                "Entity Schema Name,Entity Display Name,Attribute Schema Name,Attribute Display Name,\
                 Attribute Type,Dataverse Format,Format Details,Attribute Description,Publisher Prefix"
            )
        );
        assert_eq!(
            lines.next(),
            Some(
                "contoso_invoice,Invoice,contoso_amount,Amount,Money,Money,Currency,\
                 \"Total, incl. \"\"tax\"\"\",contoso"
            )
        );
        assert_eq!(lines.next(), None);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_header_present_for_empty_report() {
        let path = temp_path("nested").join("empty.csv");
        let writer = CsvReportWriter::new(&path);

        assert_eq!(writer.write(&[]).unwrap(), 0);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.starts_with("Entity Schema Name,"));

        if let Some(parent) = path.parent() {
            std::fs::remove_dir_all(parent).ok();
        }
    }

    #[test]
    fn test_unwritable_destination_fails() {
        let dir = temp_path("as_dir");
        std::fs::create_dir_all(&dir).unwrap();

        // A directory cannot be opened as the report file.
        let writer = CsvReportWriter::new(&dir);
        assert!(writer.write(&[record("")]).is_err());

        std::fs::remove_dir_all(dir).ok();
    }
}
