//! Result aggregation.
//!
//! Workers push [`UnitResult`]s through cloneable [`StatsSink`]s into a
//! single collector task that owns the [`Aggregate`]. The task returns the
//! aggregate once every sink is dropped.

mod aggregate;
mod report;

pub use aggregate::Aggregate;
pub use report::{
    HistogramBucket, LatencySummary, Percentile, PhaseStats, PhaseSummary, Report, Sample,
    StepTally,
};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::types::UnitResult;

const STATS_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct StatsSink {
    tx: mpsc::Sender<UnitResult>,
}

impl StatsSink {
    /// Hands a result to the collector, waiting for channel capacity.
    /// Returns `false` only if the collector is gone.
    pub async fn ingest(&self, result: UnitResult) -> bool {
        self.tx.send(result).await.is_ok()
    }
}

pub struct StatsAggregator;

impl StatsAggregator {
    /// Spawns the collector task.
    #[must_use]
    pub fn spawn(max_samples: usize) -> (StatsSink, JoinHandle<Aggregate>) {
        let (tx, mut rx) = mpsc::channel::<UnitResult>(STATS_CHANNEL_CAPACITY);
        let handle = tokio::spawn(async move {
            let mut aggregate = Aggregate::new(max_samples);
            while let Some(result) = rx.recv().await {
                aggregate.ingest(result);
            }
            tracing::debug!("Stats collector drained {} units", aggregate.units());
            aggregate
        });
        (StatsSink { tx }, handle)
    }
}
