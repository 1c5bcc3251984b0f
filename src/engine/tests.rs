use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, Url};

use super::stats::Aggregate;
use super::*;
use crate::error::{AppError, AppResult};

fn run_async_test<F>(future: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|err| AppError::validation(format!("Failed to build runtime: {}", err)))?;
    runtime.block_on(future)
}

fn template(url: &str) -> AppResult<RequestTemplate> {
    let url = Url::parse(url)
        .map_err(|err| AppError::validation(format!("Invalid test URL: {}", err)))?;
    Ok(RequestTemplate::new(Method::GET, url))
}

fn step(outcome: StepOutcome, total_ms: u64, offset_ms: u64) -> StepResult {
    StepResult {
        label: Arc::from("request"),
        outcome,
        timing: LatencyBreakdown {
            total: Duration::from_millis(total_ms),
            wait: Duration::from_millis(total_ms),
            ..LatencyBreakdown::default()
        },
        response_bytes: 10,
        offset: Duration::from_millis(offset_ms),
    }
}

fn unit(outcome: StepOutcome, total_ms: u64, offset_ms: u64) -> UnitResult {
    UnitResult {
        worker: 0,
        steps: vec![step(outcome, total_ms, offset_ms)],
    }
}

#[test]
fn percentiles_use_ceiling_rank() -> AppResult<()> {
    let mut aggregate = Aggregate::new(1_000);
    for ms in 1..=10 {
        aggregate.ingest(unit(StepOutcome::Status(200), ms, ms));
    }
    let report = aggregate.snapshot(Duration::from_secs(1), None, 1);

    let expect = [(10, 1), (25, 3), (50, 5), (75, 8), (90, 9), (95, 10), (99, 10)];
    for (percentile, ms) in expect {
        if report.percentile(percentile) != Some(Duration::from_millis(ms)) {
            return Err(AppError::validation(format!(
                "p{} expected {}ms, got {:?}",
                percentile,
                ms,
                report.percentile(percentile)
            )));
        }
    }
    if report.latency.fastest != Duration::from_millis(1)
        || report.latency.slowest != Duration::from_millis(10)
    {
        return Err(AppError::validation("Unexpected fastest/slowest"));
    }
    if report.latency.mean != Duration::from_micros(5_500) {
        return Err(AppError::validation(format!(
            "Unexpected mean: {:?}",
            report.latency.mean
        )));
    }
    Ok(())
}

#[test]
fn single_sample_percentiles_collapse() -> AppResult<()> {
    let mut aggregate = Aggregate::new(10);
    aggregate.ingest(unit(StepOutcome::Status(200), 42, 0));
    let report = aggregate.snapshot(Duration::from_secs(1), None, 1);
    if report
        .latency
        .percentiles
        .iter()
        .any(|entry| entry.latency != Duration::from_millis(42))
    {
        return Err(AppError::validation("Every percentile should be the single sample"));
    }
    Ok(())
}

#[test]
fn snapshot_is_independent_of_arrival_order() -> AppResult<()> {
    let results: Vec<UnitResult> = (0..50_u64)
        .map(|index| {
            let outcome = match index % 7 {
                0 => StepOutcome::Failed(ErrorKind::Timeout),
                3 => StepOutcome::Status(503),
                _ => StepOutcome::Status(200),
            };
            unit(outcome, (index * 37) % 91 + 1, index)
        })
        .collect();

    let mut forward = Aggregate::new(1_000);
    for result in results.iter().cloned() {
        forward.ingest(result);
    }
    let mut backward = Aggregate::new(1_000);
    for result in results.iter().rev().cloned() {
        backward.ingest(result);
    }

    let elapsed = Duration::from_secs(3);
    if forward.snapshot(elapsed, None, 4) != backward.snapshot(elapsed, None, 4) {
        return Err(AppError::validation("Reports differ by arrival order"));
    }
    Ok(())
}

#[test]
fn failures_are_counted_by_kind() -> AppResult<()> {
    let mut aggregate = Aggregate::new(100);
    aggregate.ingest(unit(StepOutcome::Status(200), 5, 0));
    aggregate.ingest(unit(StepOutcome::Status(500), 5, 1));
    aggregate.ingest(unit(StepOutcome::Failed(ErrorKind::Timeout), 5, 2));
    aggregate.ingest(unit(StepOutcome::Failed(ErrorKind::Connect), 5, 3));
    aggregate.ingest(unit(StepOutcome::Failed(ErrorKind::Timeout), 5, 4));
    let report = aggregate.snapshot(Duration::from_secs(1), Some(StopCause::Interrupt), 2);

    if report.requests != 5 || report.succeeded != 1 || report.failed != 4 {
        return Err(AppError::validation(format!(
            "Unexpected totals: {} / {} / {}",
            report.requests, report.succeeded, report.failed
        )));
    }
    if report.errors.get(&ErrorKind::Timeout).copied() != Some(2)
        || report.errors.get(&ErrorKind::Connect).copied() != Some(1)
        || report.non_success_status != 1
    {
        return Err(AppError::validation(format!(
            "Unexpected error map: {:?}",
            report.errors
        )));
    }
    if report.samples.len() != 2 || report.total_bytes != 20 {
        return Err(AppError::validation("Only answered requests keep samples"));
    }
    if report.stop_cause != Some(StopCause::Interrupt) {
        return Err(AppError::validation("Stop cause not carried into report"));
    }
    Ok(())
}

#[test]
fn sample_cap_sets_truncation_flag() -> AppResult<()> {
    let mut aggregate = Aggregate::new(3);
    for ms in 1..=5 {
        aggregate.ingest(unit(StepOutcome::Status(200), ms, ms));
    }
    let report = aggregate.snapshot(Duration::from_secs(1), None, 1);
    if report.samples.len() != 3 || !report.samples_truncated {
        return Err(AppError::validation("Expected three retained samples"));
    }
    if report.latency.slowest != Duration::from_millis(5) || report.requests != 5 {
        return Err(AppError::validation("Totals must include dropped samples"));
    }
    Ok(())
}

#[test]
fn percentiles_cover_results_past_the_sample_cap() -> AppResult<()> {
    let latencies = [1, 2, 100, 200];
    let mut forward = Aggregate::new(2);
    for (offset, ms) in (0_u64..).zip(latencies) {
        forward.ingest(unit(StepOutcome::Status(200), ms, offset));
    }
    let mut backward = Aggregate::new(2);
    for (offset, ms) in (0_u64..).zip(latencies.into_iter().rev()) {
        backward.ingest(unit(StepOutcome::Status(200), ms, offset));
    }
    let forward = forward.snapshot(Duration::from_secs(1), None, 1);
    let backward = backward.snapshot(Duration::from_secs(1), None, 1);

    if forward.latency != backward.latency {
        return Err(AppError::validation(format!(
            "Ingestion order changed latency stats: {:?} vs {:?}",
            forward.latency, backward.latency
        )));
    }
    if forward.percentile(50) != Some(Duration::from_millis(2))
        || forward.percentile(99) != Some(Duration::from_millis(200))
    {
        return Err(AppError::validation(format!(
            "Unexpected percentiles: {:?}",
            forward.latency.percentiles
        )));
    }
    if forward.samples.len() != 2 || !forward.samples_truncated {
        return Err(AppError::validation("Sample rows should still be capped"));
    }
    Ok(())
}

#[test]
fn histogram_spans_fastest_to_slowest() -> AppResult<()> {
    let mut aggregate = Aggregate::new(100);
    for ms in [10, 10, 20, 55, 110] {
        aggregate.ingest(unit(StepOutcome::Status(200), ms, 0));
    }
    let report = aggregate.snapshot(Duration::from_secs(1), None, 1);
    let histogram = &report.latency.histogram;
    if histogram.len() != 11 {
        return Err(AppError::validation("Expected 11 histogram buckets"));
    }
    let total: u64 = histogram.iter().map(|bucket| bucket.count).sum();
    if total != 5 {
        return Err(AppError::validation("Histogram lost samples"));
    }
    let first = histogram
        .first()
        .ok_or_else(|| AppError::validation("Empty histogram"))?;
    let last = histogram
        .last()
        .ok_or_else(|| AppError::validation("Empty histogram"))?;
    if first.mark != Duration::from_millis(10) || first.count != 2 {
        return Err(AppError::validation(format!("Unexpected first bucket: {:?}", first)));
    }
    if last.mark != Duration::from_millis(110) {
        return Err(AppError::validation("Last bucket must be the slowest"));
    }
    Ok(())
}

#[test]
fn empty_aggregate_reports_zeroes() -> AppResult<()> {
    let report = Aggregate::new(10).snapshot(Duration::ZERO, None, 0);
    if report.requests != 0
        || !report.latency.percentiles.is_empty()
        || report.requests_per_sec() > 0.0
    {
        return Err(AppError::validation("Empty run must produce an empty report"));
    }
    Ok(())
}

#[test]
fn budget_claims_are_exact_under_contention() -> AppResult<()> {
    run_async_test(async {
        let state = Arc::new(RunState::new(Some(1_000)));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let state = Arc::clone(&state);
            tasks.push(tokio::spawn(async move {
                let mut claimed = 0_u64;
                while state.try_claim() {
                    claimed += 1;
                    tokio::task::yield_now().await;
                }
                claimed
            }));
        }
        let mut total = 0_u64;
        for task in tasks {
            total += task.await?;
        }
        if total != 1_000 || state.remaining() != Some(0) {
            return Err(AppError::validation(format!("Claimed {} slots", total)));
        }
        Ok(())
    })
}

#[test]
fn stop_is_idempotent_and_first_cause_wins() -> AppResult<()> {
    let state = RunState::new(None);
    if state.is_stopped() || !state.try_claim() {
        return Err(AppError::validation("Fresh unbounded state must be claimable"));
    }
    if !state.stop(StopCause::Deadline) {
        return Err(AppError::validation("First stop must be effective"));
    }
    if state.stop(StopCause::Interrupt) {
        return Err(AppError::validation("Second stop must be a no-op"));
    }
    if state.stop_cause() != Some(StopCause::Deadline) {
        return Err(AppError::validation("First cause must be kept"));
    }
    Ok(())
}

#[test]
fn in_flight_guard_tracks_peak() -> AppResult<()> {
    let state = RunState::new(Some(10));
    {
        let first = state.enter();
        let _abandoned = state.enter();
        if state.in_flight() != 2 {
            return Err(AppError::validation("Expected two in-flight units"));
        }
        first.complete();
    }
    if state.in_flight() != 0 || state.peak_in_flight() != 2 || state.completed() != 1 {
        return Err(AppError::validation("Guard did not release"));
    }
    Ok(())
}

#[test]
fn rate_limiter_wakes_promptly_on_stop() -> AppResult<()> {
    run_async_test(async {
        let state = Arc::new(RunState::new(None));
        let limiter = RateLimiter::spawn(0.2, &state);
        if !limiter.acquire(&state).await {
            return Err(AppError::validation("First permit should be immediate"));
        }
        let waiter = {
            let state = Arc::clone(&state);
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire(&state).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        state.stop(StopCause::Manual);
        let acquired = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .map_err(|err| AppError::validation(format!("Limiter did not wake: {}", err)))??;
        if acquired {
            return Err(AppError::validation("Stopped limiter must not grant permits"));
        }
        Ok(())
    })
}

#[test]
fn rate_limiter_paces_permits() -> AppResult<()> {
    run_async_test(async {
        let state = Arc::new(RunState::new(None));
        let limiter = RateLimiter::spawn(20.0, &state);
        let started = tokio::time::Instant::now();
        for _ in 0..6 {
            if !limiter.acquire(&state).await {
                return Err(AppError::validation("Permit denied"));
            }
        }
        let elapsed = started.elapsed();
        if elapsed < Duration::from_millis(230) {
            return Err(AppError::validation(format!(
                "Six permits at 20/s took only {:?}",
                elapsed
            )));
        }
        Ok(())
    })
}

#[test]
fn unlimited_rate_limiter_never_blocks() -> AppResult<()> {
    run_async_test(async {
        let state = Arc::new(RunState::new(None));
        let limiter = RateLimiter::spawn(0.0, &state);
        if !limiter.is_unlimited() || !limiter.acquire(&state).await {
            return Err(AppError::validation("Zero rate must be unlimited"));
        }
        state.stop(StopCause::Manual);
        if limiter.acquire(&state).await {
            return Err(AppError::validation("Stopped state must refuse"));
        }
        Ok(())
    })
}

#[test]
fn deadline_trigger_stops_once() -> AppResult<()> {
    run_async_test(async {
        let config = RunConfig::new(
            Workload::single(template("http://127.0.0.1:9/")?),
            1,
            RunBound::Duration(Duration::from_millis(50)),
        );
        let handle = Work::start(config)?;
        let stop = handle.stop_handle();
        tokio::time::timeout(Duration::from_secs(2), stop.stopped())
            .await
            .map_err(|err| AppError::validation(format!("Deadline never fired: {}", err)))?;
        let report = handle.wait().await?;
        if report.stop_cause != Some(StopCause::Deadline) {
            return Err(AppError::validation("Expected deadline stop cause"));
        }
        Ok(())
    })
}

#[test]
fn validation_rejects_bad_configs() -> AppResult<()> {
    let base = RunConfig::new(
        Workload::single(template("http://localhost/")?),
        2,
        RunBound::Requests(10),
    );
    base.validate()?;

    let cases: Vec<(RunConfig, &str)> = vec![
        (
            RunConfig {
                concurrency: 0,
                ..base.clone()
            },
            "Concurrency",
        ),
        (
            RunConfig {
                bound: RunBound::Requests(1),
                ..base.clone()
            },
            "cannot be less than concurrency",
        ),
        (
            RunConfig {
                rate_limit: -1.0,
                ..base.clone()
            },
            "Rate limit",
        ),
        (
            RunConfig {
                workload: Workload { units: Vec::new() },
                ..base.clone()
            },
            "no execution units",
        ),
        (
            RunConfig {
                workload: Workload::single(template("ftp://localhost/")?),
                ..base.clone()
            },
            "Unsupported URL scheme",
        ),
        (
            RunConfig {
                transport: TransportOptions {
                    proxy: Some("http://[::1".to_owned()),
                    ..TransportOptions::default()
                },
                ..base.clone()
            },
            "Invalid proxy",
        ),
    ];

    for (config, needle) in cases {
        match config.validate() {
            Err(err) if err.to_string().contains(needle) => {}
            Err(err) => {
                return Err(AppError::validation(format!(
                    "Expected '{}' error, got '{}'",
                    needle, err
                )));
            }
            Ok(()) => {
                return Err(AppError::validation(format!("Expected '{}' error", needle)));
            }
        }
    }

    let timed = RunConfig {
        bound: RunBound::Duration(Duration::from_secs(1)),
        concurrency: 50,
        ..base
    };
    timed.validate()?;
    Ok(())
}

#[test]
fn workload_assigns_units_round_robin() -> AppResult<()> {
    let workload = Workload {
        units: vec![
            ExecutionUnit::single(template("http://a.test/")?),
            ExecutionUnit::single(template("http://b.test/")?),
        ],
    };
    let hosts: Vec<Option<String>> = (0..4)
        .map(|worker| {
            workload.unit_for(worker).and_then(|unit| {
                unit.steps
                    .first()
                    .and_then(|step| step.request.url.host_str().map(str::to_owned))
            })
        })
        .collect();
    let expected = ["a.test", "b.test", "a.test", "b.test"]
        .iter()
        .map(|host| Some((*host).to_owned()))
        .collect::<Vec<_>>();
    if hosts != expected {
        return Err(AppError::validation(format!("Unexpected assignment: {:?}", hosts)));
    }
    if (Workload { units: Vec::new() }).unit_for(0).is_some() {
        return Err(AppError::validation("Empty workload has no units"));
    }
    Ok(())
}
