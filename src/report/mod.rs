//! Renders a finished [`Report`] as summary text, CSV or JSON.

mod csv;
mod json;
mod summary;


use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufWriter};

use crate::args::OutputFormat;
use crate::engine::Report;
use crate::error::AppResult;

pub use csv::{CSV_HEADER, csv_lines};
pub use json::report_json;
pub use summary::summary_lines;

/// Renders the report in the requested format.
///
/// # Errors
///
/// Returns an error when the JSON document cannot be serialized.
pub fn render(report: &Report, format: OutputFormat) -> AppResult<String> {
    let mut output = match format {
        OutputFormat::Summary => summary_lines(report).join("\n"),
        OutputFormat::Csv => csv_lines(report).join("\n"),
        OutputFormat::Json => serde_json::to_string_pretty(&report_json(report))?,
    };
    output.push('\n');
    Ok(output)
}

/// Writes the rendered report to `path`, or stdout when no path is given.
///
/// # Errors
///
/// Returns an error when rendering fails or the destination cannot be written.
pub async fn emit(report: &Report, format: OutputFormat, path: Option<&Path>) -> AppResult<()> {
    let rendered = render(report, format)?;
    match path {
        Some(path) => {
            let file = tokio::fs::File::create(path).await?;
            let mut writer = BufWriter::new(file);
            writer.write_all(rendered.as_bytes()).await?;
            writer.flush().await?;
            tracing::info!("Report written to {}", path.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(rendered.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

fn secs(duration: Duration) -> String {
    format!("{:.4}", duration.as_secs_f64())
}
