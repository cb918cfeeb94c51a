//! Result handling module
//!
//! Aggregates unit results into a job result and writes per-unit report
//! artifacts (HTML, CSV).

mod aggregate;
mod csv_report;
mod html_report;
mod report;

pub use aggregate::aggregate;
pub use csv_report::CsvReportGenerator;
pub use html_report::HtmlReportGenerator;
pub use report::{ReportFormat, ReportGenerator, ReportSet};
