//! CSV report variant

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use super::report::create_report_file;
use super::{ReportFormat, ReportGenerator};
use crate::models::UnitResult;

const HEADER: [&str; 8] = [
    "RunID",
    "Status",
    "TestType",
    "Description",
    "StartTime",
    "EndTime",
    "Duration(ms)",
    "ErrorMessage",
];

/// Writes a one-row CSV file per unit result
pub struct CsvReportGenerator {
    directory: PathBuf,
}

impl CsvReportGenerator {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }
}

impl ReportGenerator for CsvReportGenerator {
    fn format(&self) -> ReportFormat {
        ReportFormat::Csv
    }

    fn generate(&self, result: &UnitResult, run_id: &str) -> Result<PathBuf> {
        let (path, file) = create_report_file(&self.directory, run_id, ReportFormat::Csv)?;
        let mut writer = ::csv::Writer::from_writer(file);

        writer.write_record(HEADER)?;
        writer.write_record([
            run_id.to_string(),
            result.outcome.run_status().to_string(),
            result.unit_name.clone(),
            result.description.clone().unwrap_or_default(),
            format_time(&result.started_at),
            format_time(&result.finished_at),
            result.duration_ms.to_string(),
            result.error_message.clone().unwrap_or_default(),
        ])?;
        writer
            .flush()
            .with_context(|| format!("Could not write {}", path.display()))?;

        info!("CSV report saved: {}", path.display());
        Ok(path)
    }
}

fn format_time(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_csv_report_contents() {
        let dir = tempdir().unwrap();
        let generator = CsvReportGenerator::new(dir.path());
        let result = UnitResult::failed(Utc::now(), "expected \"1\", got 2")
            .with_unit_name("api-content")
            .with_description("Verify, with commas");

        let path = generator.generate(&result, "run-7").unwrap();
        assert!(path.starts_with(dir.path()));

        let mut reader = ::csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), HEADER.to_vec());

        let rows: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "run-7");
        assert_eq!(&rows[0][1], "FAILED");
        assert_eq!(&rows[0][2], "api-content");
        assert_eq!(&rows[0][3], "Verify, with commas");
        assert_eq!(&rows[0][7], "expected \"1\", got 2");
    }
}
