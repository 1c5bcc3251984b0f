use crate::engine::Report;

use super::secs;

pub const CSV_HEADER: &str =
    "response-time,DNS+dialup,DNS,Response-delay,Response-read,status-code,offset";

/// Header plus one line per retained sample, in issue order.
#[must_use]
pub fn csv_lines(report: &Report) -> Vec<String> {
    let mut lines = Vec::with_capacity(report.samples.len().saturating_add(1));
    lines.push(CSV_HEADER.to_owned());
    for sample in &report.samples {
        let timing = sample.timing;
        lines.push(format!(
            "{},{},{},{},{},{},{}",
            secs(timing.total),
            secs(timing.dns.saturating_add(timing.connect)),
            secs(timing.dns),
            secs(timing.wait),
            secs(timing.read),
            sample.status,
            secs(sample.offset)
        ));
    }
    lines
}
