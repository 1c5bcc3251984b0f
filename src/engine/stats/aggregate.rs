use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::state::StopCause;
use crate::engine::types::{ErrorKind, StepOutcome, StepResult, UnitResult};

use super::report::{
    LatencySummary, PhaseStats, PhaseSummary, Report, Sample, StepTally, histogram, percentiles,
};

#[derive(Debug, Clone, Copy)]
struct PhaseAccumulator {
    sum_nanos: u128,
    min: Duration,
    max: Duration,
}

impl Default for PhaseAccumulator {
    fn default() -> Self {
        Self {
            sum_nanos: 0,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }
}

impl PhaseAccumulator {
    fn record(&mut self, value: Duration) {
        self.sum_nanos = self.sum_nanos.saturating_add(value.as_nanos());
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn summarize(&self, count: u64) -> PhaseStats {
        if count == 0 {
            return PhaseStats::default();
        }
        PhaseStats {
            mean: mean_duration(self.sum_nanos, count),
            fastest: self.min,
            slowest: self.max,
        }
    }
}

fn mean_duration(sum_nanos: u128, count: u64) -> Duration {
    let mean = sum_nanos.checked_div(u128::from(count)).unwrap_or(0);
    Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX))
}

/// Running totals of a load run.
///
/// Every counter is a commutative integer sum, so the final report does not
/// depend on the order results arrived in.
#[derive(Debug, Clone)]
pub struct Aggregate {
    max_samples: usize,
    units: u64,
    units_succeeded: u64,
    requests: u64,
    succeeded: u64,
    errors: BTreeMap<ErrorKind, u64>,
    non_success_status: u64,
    status_codes: BTreeMap<u16, u64>,
    total_bytes: u64,
    answered: u64,
    total: PhaseAccumulator,
    dns: PhaseAccumulator,
    connect: PhaseAccumulator,
    wait: PhaseAccumulator,
    read: PhaseAccumulator,
    steps: BTreeMap<Arc<str>, StepTally>,
    /// Total latency of every answered request; percentiles come from here.
    latencies: Vec<u64>,
    /// Per-response rows for CSV/JSON, capped at `max_samples`.
    samples: Vec<Sample>,
    samples_truncated: bool,
}

impl Aggregate {
    #[must_use]
    pub fn new(max_samples: usize) -> Self {
        Self {
            max_samples,
            units: 0,
            units_succeeded: 0,
            requests: 0,
            succeeded: 0,
            errors: BTreeMap::new(),
            non_success_status: 0,
            status_codes: BTreeMap::new(),
            total_bytes: 0,
            answered: 0,
            total: PhaseAccumulator::default(),
            dns: PhaseAccumulator::default(),
            connect: PhaseAccumulator::default(),
            wait: PhaseAccumulator::default(),
            read: PhaseAccumulator::default(),
            steps: BTreeMap::new(),
            latencies: Vec::new(),
            samples: Vec::new(),
            samples_truncated: false,
        }
    }

    #[must_use]
    pub const fn units(&self) -> u64 {
        self.units
    }

    #[must_use]
    pub const fn requests(&self) -> u64 {
        self.requests
    }

    pub fn ingest(&mut self, result: UnitResult) {
        self.units = self.units.saturating_add(1);
        if result.is_success() {
            self.units_succeeded = self.units_succeeded.saturating_add(1);
        }
        for step in &result.steps {
            self.ingest_step(step);
        }
    }

    fn ingest_step(&mut self, step: &StepResult) {
        self.requests = self.requests.saturating_add(1);
        let tally = self.steps.entry(Arc::clone(&step.label)).or_default();
        tally.requests = tally.requests.saturating_add(1);
        if step.outcome.is_success() {
            self.succeeded = self.succeeded.saturating_add(1);
            tally.succeeded = tally.succeeded.saturating_add(1);
        }

        let status = match step.outcome {
            StepOutcome::Status(status) => status,
            StepOutcome::Failed(kind) => {
                let count = self.errors.entry(kind).or_insert(0);
                *count = count.saturating_add(1);
                return;
            }
        };

        if !step.outcome.is_success() {
            self.non_success_status = self.non_success_status.saturating_add(1);
        }
        let count = self.status_codes.entry(status).or_insert(0);
        *count = count.saturating_add(1);
        self.total_bytes = self.total_bytes.saturating_add(step.response_bytes);
        self.answered = self.answered.saturating_add(1);

        let timing = step.timing;
        self.total.record(timing.total);
        self.dns.record(timing.dns);
        self.connect.record(timing.connect);
        self.wait.record(timing.wait);
        self.read.record(timing.read);
        self.latencies
            .push(u64::try_from(timing.total.as_nanos()).unwrap_or(u64::MAX));

        if self.samples.len() < self.max_samples {
            self.samples.push(Sample {
                offset: step.offset,
                timing,
                status,
                bytes: step.response_bytes,
            });
        } else {
            self.samples_truncated = true;
        }
    }

    /// Computes the final report.
    #[must_use]
    pub fn snapshot(
        &self,
        elapsed: Duration,
        stop_cause: Option<StopCause>,
        peak_in_flight: u64,
    ) -> Report {
        let mut samples = self.samples.clone();
        samples.sort_unstable();

        let mut sorted_nanos = self.latencies.clone();
        sorted_nanos.sort_unstable();

        let latency = if self.answered == 0 {
            LatencySummary::default()
        } else {
            LatencySummary {
                fastest: self.total.min,
                slowest: self.total.max,
                mean: mean_duration(self.total.sum_nanos, self.answered),
                percentiles: percentiles(&sorted_nanos),
                histogram: histogram(&sorted_nanos),
            }
        };

        let failed = self.requests.saturating_sub(self.succeeded);

        Report {
            elapsed,
            stop_cause,
            units: self.units,
            units_succeeded: self.units_succeeded,
            requests: self.requests,
            succeeded: self.succeeded,
            failed,
            errors: self.errors.clone(),
            non_success_status: self.non_success_status,
            status_codes: self.status_codes.clone(),
            total_bytes: self.total_bytes,
            latency,
            phases: PhaseSummary {
                dns: self.dns.summarize(self.answered),
                connect: self.connect.summarize(self.answered),
                wait: self.wait.summarize(self.answered),
                read: self.read.summarize(self.answered),
            },
            steps: self.steps.clone(),
            peak_in_flight,
            samples_truncated: self.samples_truncated,
            samples,
        }
    }
}
