//! HTML report variant

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use super::report::create_report_file;
use super::{ReportFormat, ReportGenerator};
use crate::models::UnitResult;

/// Writes a self-contained HTML page per unit result
pub struct HtmlReportGenerator {
    directory: PathBuf,
}

impl HtmlReportGenerator {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }
}

impl ReportGenerator for HtmlReportGenerator {
    fn format(&self) -> ReportFormat {
        ReportFormat::Html
    }

    fn generate(&self, result: &UnitResult, run_id: &str) -> Result<PathBuf> {
        let (path, mut file) = create_report_file(&self.directory, run_id, ReportFormat::Html)?;
        file.write_all(render(result, run_id).as_bytes())
            .with_context(|| format!("Could not write {}", path.display()))?;

        info!("HTML report saved: {}", path.display());
        Ok(path)
    }
}

fn render(result: &UnitResult, run_id: &str) -> String {
    let status = result.outcome.run_status().to_string();
    let status_class = if result.is_success() { "pass" } else { "fail" };

    let rows = [
        ("Run ID", run_id.to_string()),
        ("Test", result.unit_name.clone()),
        ("Description", result.description.clone().unwrap_or_default()),
        ("Target", result.target.clone().unwrap_or_default()),
        ("Parameters", result.parameters.clone().unwrap_or_default()),
        ("Started", format_datetime(&result.started_at)),
        ("Finished", format_datetime(&result.finished_at)),
        (
            "Duration",
            format!("{:.3} seconds", result.duration_ms as f64 / 1000.0),
        ),
        ("Attempt", result.attempts.to_string()),
    ];

    let table: String = rows
        .iter()
        .map(|(label, value)| {
            format!(
                "            <tr><th>{}</th><td>{}</td></tr>\n",
                label,
                escape_html(value)
            )
        })
        .collect();

    let error = result
        .error_message
        .as_deref()
        .map(|msg| format!("        <h2>Error</h2>\n        <pre>{}</pre>\n", escape_html(msg)))
        .unwrap_or_default();

    let screenshot = result
        .screenshot_path
        .as_ref()
        .map(|p| {
            let p = escape_html(&p.display().to_string());
            format!("        <h2>Screenshot</h2>\n        <a href=\"{p}\"><img src=\"{p}\" alt=\"screenshot\"></a>\n")
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Test Report - {title}</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 40px; background: #f5f5f5; }}
        .container {{ max-width: 960px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        h1 {{ color: #333; border-bottom: 2px solid #007bff; padding-bottom: 10px; }}
        table {{ width: 100%; border-collapse: collapse; margin: 20px 0; }}
        th, td {{ padding: 10px; text-align: left; border-bottom: 1px solid #ddd; }}
        th {{ width: 180px; color: #555; }}
        pre {{ background: #fdf2f2; padding: 12px; white-space: pre-wrap; }}
        img {{ max-width: 100%; }}
        .pass {{ color: #28a745; }}
        .fail {{ color: #dc3545; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Test Report</h1>
        <h2 class="{status_class}">{status}</h2>
        <table>
{table}        </table>
{error}{screenshot}    </div>
</body>
</html>
"#,
        title = escape_html(&result.unit_name),
    )
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"a" & 'b'</b>"#),
            "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_html_report_written() {
        let dir = tempdir().unwrap();
        let generator = HtmlReportGenerator::new(dir.path());
        let result = UnitResult::failed(Utc::now(), "<script>alert(1)</script>")
            .with_unit_name("ui-search")
            .with_target("http://example.com")
            .with_screenshot("/tmp/shot.png");

        let path = generator.generate(&result, "run-1").unwrap();
        let html = fs::read_to_string(&path).unwrap();

        assert!(html.contains("<title>Test Report - ui-search</title>"));
        assert!(html.contains(r#"<h2 class="fail">FAILED</h2>"#));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("/tmp/shot.png"));
    }

    #[test]
    fn test_html_report_for_success_has_no_error_block() {
        let html = render(&UnitResult::succeeded(Utc::now()).with_unit_name("ok"), "r");
        assert!(html.contains("COMPLETED"));
        assert!(!html.contains("<h2>Error</h2>"));
    }
}
