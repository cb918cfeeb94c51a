//! Output formatters for job results
//!
//! Provides JSON, Table, and summary output formats.

use serde::Serialize;

use crate::models::{JobResult, Outcome, TagSet, UnitResult};
use crate::suite::UnitInfo;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobJson<'a> {
    run_id: &'a str,
    result: &'a JobResult,
    units: &'a [UnitResult],
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn outcome_label(&self, outcome: Outcome) -> String {
        let label = format!("{} {}", outcome.symbol(), outcome);
        if !self.colorize {
            return label;
        }
        match outcome {
            Outcome::Succeeded => format!("\x1b[32m{label}\x1b[0m"),
            Outcome::Failed => format!("\x1b[31m{label}\x1b[0m"),
        }
    }

    /// Format a single unit result as one line
    pub fn format_unit(&self, result: &UnitResult) -> String {
        let mut line = format!(
            "{:28} {} [{:>6}ms] attempt {}",
            result.unit_name,
            self.outcome_label(result.outcome),
            result.duration_ms,
            result.attempts
        );
        if let Some(message) = &result.error_message {
            line.push_str(&format!("\n      {}", message.lines().next().unwrap_or_default()));
        }
        line
    }

    /// Format the outcome of one job with its unit results
    pub fn format_job(&self, run_id: &str, result: &JobResult, units: &[UnitResult]) -> String {
        match self.format {
            OutputFormat::Table => self.format_job_table(run_id, result, units),
            OutputFormat::Json => serde_json::to_string(&JobJson {
                run_id,
                result,
                units,
            })
            .unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&JobJson {
                run_id,
                result,
                units,
            })
            .unwrap_or_default(),
            OutputFormat::Summary => format!("Run {run_id}: {result}"),
        }
    }

    fn format_job_table(&self, run_id: &str, result: &JobResult, units: &[UnitResult]) -> String {
        let mut output = String::new();

        output.push_str("\n══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(" Run {run_id}\n"));
        output.push_str("══════════════════════════════════════════════════════════════\n");

        for unit in units {
            output.push_str(&format!(" {}\n", self.format_unit(unit)));
        }
        if !units.is_empty() {
            output.push_str("──────────────────────────────────────────────────────────────\n");
        }

        output.push_str(&format!(
            " Status: {} | Tests: {} | Failed: {} | Duration: {}ms\n",
            self.outcome_label(result.outcome),
            result.unit_count,
            result.failure_count,
            result.duration_ms
        ));
        if let Some(url) = &result.report_url {
            output.push_str(&format!(" Report: {url}\n"));
        }
        if let Some(message) = &result.combined_error_message {
            output.push_str("\n Errors:\n");
            for line in message.lines() {
                output.push_str(&format!("   {line}\n"));
            }
        }

        output
    }

    /// Format registered units, marking those selected by `requested`
    pub fn format_units<'a>(
        &self,
        units: impl IntoIterator<Item = &'a UnitInfo>,
        requested: Option<&TagSet>,
        detailed: bool,
    ) -> String {
        let mut output = String::new();
        output.push_str("Registered tests:\n\n");

        let mut count = 0;
        for unit in units {
            let selected = requested.map(|tags| unit.matches(tags));
            if selected == Some(false) && !detailed {
                continue;
            }
            count += 1;

            let marker = match selected {
                Some(true) => "*",
                Some(false) => " ",
                None => "-",
            };
            let tags = unit.tags.iter().cloned().collect::<Vec<_>>().join(", ");
            output.push_str(&format!(" {} {:28} [{}]\n", marker, unit.name, tags));
            if detailed && !unit.description.is_empty() {
                output.push_str(&format!("      {}\n", unit.description));
            }
        }

        if count == 0 {
            output.push_str("  (none)\n");
        }
        output
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}
