use crate::engine::Report;
use crate::engine::stats::PhaseStats;

use super::secs;

const BAR_WIDTH: u64 = 40;
const BAR_CHAR: char = '■';

/// Human-readable summary, one entry per output line.
#[must_use]
pub fn summary_lines(report: &Report) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(String::new());
    lines.push("Summary:".to_owned());
    lines.push(format!("  Total:\t{} secs", secs(report.elapsed)));
    if report.status_codes.is_empty() {
        lines.push("  No responses received.".to_owned());
    } else {
        lines.push(format!("  Slowest:\t{} secs", secs(report.latency.slowest)));
        lines.push(format!("  Fastest:\t{} secs", secs(report.latency.fastest)));
        lines.push(format!("  Average:\t{} secs", secs(report.latency.mean)));
    }
    lines.push(format!("  Requests/sec:\t{:.4}", report.requests_per_sec()));
    lines.push(String::new());
    lines.push(format!("  Total data:\t{} bytes", report.total_bytes));
    lines.push(format!("  Size/request:\t{} bytes", report.size_per_request()));
    if let Some(cause) = report.stop_cause {
        lines.push(format!("  Stopped by:\t{}", cause.as_str()));
    }

    if !report.latency.histogram.is_empty() {
        lines.push(String::new());
        lines.push("Response time histogram:".to_owned());
        lines.extend(histogram_lines(report));
    }

    if !report.latency.percentiles.is_empty() {
        lines.push(String::new());
        lines.push("Latency distribution:".to_owned());
        for entry in &report.latency.percentiles {
            lines.push(format!(
                "  {}% in {} secs",
                entry.percentile,
                secs(entry.latency)
            ));
        }
    }

    if !report.status_codes.is_empty() {
        lines.push(String::new());
        lines.push("Details (average, fastest, slowest):".to_owned());
        lines.push(phase_line("DNS-lookup", report.phases.dns));
        lines.push(phase_line("DNS+dialup", combined(report)));
        lines.push(phase_line("resp wait", report.phases.wait));
        lines.push(phase_line("resp read", report.phases.read));

        lines.push(String::new());
        lines.push("Status code distribution:".to_owned());
        for (code, count) in &report.status_codes {
            lines.push(format!("  [{}]\t{} responses", code, count));
        }
    }

    if !report.errors.is_empty() {
        lines.push(String::new());
        lines.push("Error distribution:".to_owned());
        for (kind, count) in &report.errors {
            lines.push(format!("  [{}]\t{}", count, kind.as_str()));
        }
    }

    if report.steps.len() > 1 {
        lines.push(String::new());
        lines.push("Steps (succeeded / requests):".to_owned());
        for (label, tally) in &report.steps {
            lines.push(format!(
                "  {}:\t{} / {}",
                label, tally.succeeded, tally.requests
            ));
        }
    }

    if report.samples_truncated {
        lines.push(String::new());
        lines.push(format!(
            "Note: per-response rows are limited to the first {}; statistics cover every response.",
            report.samples.len()
        ));
    }

    lines
}

fn histogram_lines(report: &Report) -> Vec<String> {
    let max = report
        .latency
        .histogram
        .iter()
        .map(|bucket| bucket.count)
        .max()
        .unwrap_or(0);
    report
        .latency
        .histogram
        .iter()
        .map(|bucket| {
            let width = bucket
                .count
                .saturating_mul(BAR_WIDTH)
                .checked_div(max)
                .unwrap_or(0);
            let bar: String = std::iter::repeat_n(BAR_CHAR, usize::try_from(width).unwrap_or(0))
                .collect();
            format!("  {} [{}]\t|{}", secs(bucket.mark), bucket.count, bar)
        })
        .collect()
}

/// DNS plus dial. Fastest and slowest are bounds, not values of one exchange.
fn combined(report: &Report) -> PhaseStats {
    let dns = report.phases.dns;
    let connect = report.phases.connect;
    PhaseStats {
        mean: dns.mean.saturating_add(connect.mean),
        fastest: dns.fastest.saturating_add(connect.fastest),
        slowest: dns.slowest.saturating_add(connect.slowest),
    }
}

fn phase_line(name: &str, stats: PhaseStats) -> String {
    format!(
        "  {}:\t{} secs, {} secs, {} secs",
        name,
        secs(stats.mean),
        secs(stats.fastest),
        secs(stats.slowest)
    )
}
