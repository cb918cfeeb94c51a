//! Report generation for unit results
//!
//! Every configured variant is invoked for every unit result, whatever its
//! outcome. A variant that fails to write is logged and skipped.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

use super::{CsvReportGenerator, HtmlReportGenerator};
use crate::models::UnitResult;

/// Report output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Html,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "html" | "htm" => Some(ReportFormat::Html),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Csv => "csv",
        }
    }
}

/// A pluggable report variant
pub trait ReportGenerator: Send + Sync {
    fn format(&self) -> ReportFormat;

    /// Persist a report for one unit result and return its location
    fn generate(&self, result: &UnitResult, run_id: &str) -> Result<PathBuf>;
}

/// All report variants enabled for this worker
#[derive(Default)]
pub struct ReportSet {
    generators: Vec<Box<dyn ReportGenerator>>,
}

impl ReportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the variants named in `formats`, writing into `directory`
    pub fn from_formats(formats: &[ReportFormat], directory: impl AsRef<Path>) -> Self {
        let directory = directory.as_ref();
        formats.iter().fold(Self::new(), |set, format| match format {
            ReportFormat::Html => set.with(HtmlReportGenerator::new(directory)),
            ReportFormat::Csv => set.with(CsvReportGenerator::new(directory)),
        })
    }

    pub fn with(mut self, generator: impl ReportGenerator + 'static) -> Self {
        self.generators.push(Box::new(generator));
        self
    }

    /// [`generate`](Self::generate) on the blocking pool, keeping file
    /// writes off the async worker threads. A panicking generator panics
    /// the caller.
    pub async fn spawn_generate(
        self: Arc<Self>,
        result: &UnitResult,
        run_id: &str,
    ) -> Option<PathBuf> {
        if self.generators.is_empty() {
            return None;
        }

        let result = result.clone();
        let run_id = run_id.to_string();
        match tokio::task::spawn_blocking(move || self.generate(&result, &run_id)).await {
            Ok(path) => path,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                error!("Report generation task failed: {}", e);
                None
            }
        }
    }

    /// Run every variant for `result`.
    ///
    /// Returns the HTML report path when one was written, otherwise the
    /// first path any variant produced.
    pub fn generate(&self, result: &UnitResult, run_id: &str) -> Option<PathBuf> {
        let mut primary = None;
        let mut fallback = None;

        for generator in &self.generators {
            match generator.generate(result, run_id) {
                Ok(path) => {
                    debug!(
                        "{:?} report for '{}' written to {}",
                        generator.format(),
                        result.unit_name,
                        path.display()
                    );
                    if generator.format() == ReportFormat::Html && primary.is_none() {
                        primary = Some(path);
                    } else if fallback.is_none() {
                        fallback = Some(path);
                    }
                }
                Err(e) => {
                    error!(
                        "Could not save {:?} report for '{}': {:#}",
                        generator.format(),
                        result.unit_name,
                        e
                    );
                }
            }
        }

        primary.or(fallback)
    }
}

/// Create `report-{run_id}-{unique}.{ext}` in `directory` without ever
/// replacing an existing file
pub(super) fn create_report_file(
    directory: &Path,
    run_id: &str,
    format: ReportFormat,
) -> Result<(PathBuf, File)> {
    fs::create_dir_all(directory)
        .with_context(|| format!("Could not create reports directory: {}", directory.display()))?;

    let run_id = sanitize(run_id);
    let mut last_err = None;

    for _ in 0..8 {
        let filename = format!("report-{}-{}.{}", run_id, short_id(), format.extension());
        let path = directory.join(filename);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => last_err = Some(e),
            Err(e) => {
                return Err(e).with_context(|| format!("Could not create {}", path.display()))
            }
        }
    }

    Err(last_err
        .map(anyhow::Error::from)
        .unwrap_or_else(|| anyhow::anyhow!("no free report filename")))
    .context("Could not allocate a unique report filename")
}

fn short_id() -> String {
    format!("{:08x}", rand::random::<u32>())
}

fn sanitize(run_id: &str) -> String {
    let cleaned: String = run_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "run".to_string()
    } else {
        cleaned
    }
}
