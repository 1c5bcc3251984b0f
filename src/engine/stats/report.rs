use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::state::StopCause;
use crate::engine::types::{ErrorKind, LatencyBreakdown};

pub const PERCENTILES: [u8; 7] = [10, 25, 50, 75, 90, 95, 99];
pub const HISTOGRAM_BUCKETS: usize = 10;

/// One retained response, ordered by issue offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Sample {
    pub offset: Duration,
    pub timing: LatencyBreakdown,
    pub status: u16,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Percentile {
    pub percentile: u8,
    pub latency: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramBucket {
    pub mark: Duration,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LatencySummary {
    pub fastest: Duration,
    pub slowest: Duration,
    pub mean: Duration,
    pub percentiles: Vec<Percentile>,
    pub histogram: Vec<HistogramBucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseStats {
    pub mean: Duration,
    pub fastest: Duration,
    pub slowest: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseSummary {
    pub dns: PhaseStats,
    pub connect: PhaseStats,
    pub wait: PhaseStats,
    pub read: PhaseStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepTally {
    pub requests: u64,
    pub succeeded: u64,
}

/// Final statistics of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub elapsed: Duration,
    pub stop_cause: Option<StopCause>,
    pub units: u64,
    pub units_succeeded: u64,
    pub requests: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub errors: BTreeMap<ErrorKind, u64>,
    /// Responses that arrived with a status outside 2xx.
    pub non_success_status: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub total_bytes: u64,
    pub latency: LatencySummary,
    pub phases: PhaseSummary,
    pub steps: BTreeMap<Arc<str>, StepTally>,
    pub peak_in_flight: u64,
    pub samples_truncated: bool,
    pub samples: Vec<Sample>,
}

impl Report {
    #[must_use]
    pub fn requests_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.requests as f64 / secs
        } else {
            0.0
        }
    }

    /// Average body size of answered requests.
    #[must_use]
    pub fn size_per_request(&self) -> u64 {
        let answered = self.status_codes.values().copied().sum::<u64>();
        self.total_bytes.checked_div(answered).unwrap_or(0)
    }

    #[must_use]
    pub fn percentile(&self, percentile: u8) -> Option<Duration> {
        self.latency
            .percentiles
            .iter()
            .find(|entry| entry.percentile == percentile)
            .map(|entry| entry.latency)
    }
}

/// Index of percentile `p` in a sorted set of `len` samples:
/// `ceil(p * len / 100) - 1`, clamped to the set.
pub(crate) fn percentile_index(percentile: u8, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let scaled = len.saturating_mul(usize::from(percentile));
    let rank = scaled.div_ceil(100);
    Some(rank.saturating_sub(1).min(len.saturating_sub(1)))
}

pub(crate) fn percentiles(sorted_nanos: &[u64]) -> Vec<Percentile> {
    PERCENTILES
        .iter()
        .filter_map(|&percentile| {
            let index = percentile_index(percentile, sorted_nanos.len())?;
            let nanos = sorted_nanos.get(index).copied()?;
            Some(Percentile {
                percentile,
                latency: Duration::from_nanos(nanos),
            })
        })
        .collect()
}

/// Linear histogram between fastest and slowest with one extra bucket for
/// the slowest mark. Each latency lands in the first bucket whose mark is
/// not below it.
pub(crate) fn histogram(sorted_nanos: &[u64]) -> Vec<HistogramBucket> {
    let (Some(&fastest), Some(&slowest)) = (sorted_nanos.first(), sorted_nanos.last()) else {
        return Vec::new();
    };
    let bucket_count = u64::try_from(HISTOGRAM_BUCKETS).unwrap_or(u64::MAX);
    let width = slowest
        .saturating_sub(fastest)
        .checked_div(bucket_count)
        .unwrap_or(0);
    let mut marks: Vec<u64> = (0..bucket_count)
        .map(|bucket| fastest.saturating_add(width.saturating_mul(bucket)))
        .collect();
    marks.push(slowest);

    let mut counts = vec![0_u64; marks.len()];
    let mut bucket = 0_usize;
    for &latency in sorted_nanos {
        while marks.get(bucket).is_some_and(|&mark| latency > mark) {
            bucket = bucket.saturating_add(1);
        }
        if let Some(count) = counts.get_mut(bucket) {
            *count = count.saturating_add(1);
        }
    }

    marks
        .into_iter()
        .zip(counts)
        .map(|(mark, count)| HistogramBucket {
            mark: Duration::from_nanos(mark),
            count,
        })
        .collect()
}
