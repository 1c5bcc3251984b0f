use std::time::Duration;

use serde_json::{Map, Value, json};

use crate::engine::Report;
use crate::engine::stats::PhaseStats;

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

fn phase_json(stats: PhaseStats) -> Value {
    json!({
        "mean_ms": millis(stats.mean),
        "fastest_ms": millis(stats.fastest),
        "slowest_ms": millis(stats.slowest)
    })
}

/// Full report as a JSON document. Latencies are in milliseconds.
#[must_use]
pub fn report_json(report: &Report) -> Value {
    let errors: Map<String, Value> = report
        .errors
        .iter()
        .map(|(kind, count)| (kind.as_str().to_owned(), json!(count)))
        .collect();
    let status_codes: Map<String, Value> = report
        .status_codes
        .iter()
        .map(|(code, count)| (code.to_string(), json!(count)))
        .collect();
    let steps: Map<String, Value> = report
        .steps
        .iter()
        .map(|(label, tally)| {
            (
                label.to_string(),
                json!({ "requests": tally.requests, "succeeded": tally.succeeded }),
            )
        })
        .collect();
    let percentiles: Map<String, Value> = report
        .latency
        .percentiles
        .iter()
        .map(|entry| (format!("p{}", entry.percentile), json!(millis(entry.latency))))
        .collect();
    let histogram: Vec<Value> = report
        .latency
        .histogram
        .iter()
        .map(|bucket| json!({ "mark_ms": millis(bucket.mark), "count": bucket.count }))
        .collect();
    let samples: Vec<Value> = report
        .samples
        .iter()
        .map(|sample| {
            json!({
                "offset_ms": millis(sample.offset),
                "total_ms": millis(sample.timing.total),
                "dns_ms": millis(sample.timing.dns),
                "connect_ms": millis(sample.timing.connect),
                "wait_ms": millis(sample.timing.wait),
                "read_ms": millis(sample.timing.read),
                "status": sample.status,
                "bytes": sample.bytes
            })
        })
        .collect();

    json!({
        "summary": {
            "elapsed_ms": millis(report.elapsed),
            "stop_cause": report.stop_cause.map(|cause| cause.as_str()),
            "units": report.units,
            "units_succeeded": report.units_succeeded,
            "requests": report.requests,
            "succeeded": report.succeeded,
            "failed": report.failed,
            "non_success_status": report.non_success_status,
            "requests_per_sec": report.requests_per_sec(),
            "total_bytes": report.total_bytes,
            "size_per_request": report.size_per_request(),
            "peak_in_flight": report.peak_in_flight,
            "samples_truncated": report.samples_truncated
        },
        "latency": {
            "fastest_ms": millis(report.latency.fastest),
            "slowest_ms": millis(report.latency.slowest),
            "mean_ms": millis(report.latency.mean),
            "percentiles": percentiles,
            "histogram": histogram
        },
        "phases": {
            "dns": phase_json(report.phases.dns),
            "connect": phase_json(report.phases.connect),
            "wait": phase_json(report.phases.wait),
            "read": phase_json(report.phases.read)
        },
        "status_codes": status_codes,
        "errors": errors,
        "steps": steps,
        "samples": samples
    })
}
