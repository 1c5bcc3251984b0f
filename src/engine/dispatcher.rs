use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::AppResult;

use super::config::RunConfig;
use super::executor::RequestExecutor;
use super::lifecycle::spawn_deadline_trigger;
use super::rate::RateLimiter;
use super::state::{RunState, StopCause};
use super::stats::{Aggregate, Report, StatsAggregator, StatsSink};
use super::unit::{BodyContext, ExecutionUnit};

/// Cloneable handle that can end a run from any task.
#[derive(Debug, Clone)]
pub struct StopHandle {
    state: Arc<RunState>,
}

impl StopHandle {
    /// Requests a stop. Returns `true` for the call that actually stopped the run.
    pub fn stop(&self, cause: StopCause) -> bool {
        let effective = self.state.stop(cause);
        if effective {
            info!("Stopping run: {}", cause.as_str());
        }
        effective
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.is_stopped()
    }

    pub async fn stopped(&self) {
        self.state.stopped().await;
    }
}

/// The dispatcher: entry point of the engine.
pub struct Work;

impl Work {
    /// Validates `config` and spawns the aggregator, the rate limiter and
    /// exactly `concurrency` workers. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid or the HTTP client
    /// cannot be built. Nothing is spawned in that case.
    pub fn start(config: RunConfig) -> AppResult<RunHandle> {
        config.validate()?;
        let started = Instant::now();
        let executor = RequestExecutor::from_config(&config, started)?;

        let state = Arc::new(RunState::new(config.budget()));
        let (sink, aggregator) = StatsAggregator::spawn(config.max_samples);
        let limiter = RateLimiter::spawn(config.rate_limit, &state);

        let mut workers = Vec::with_capacity(config.concurrency);
        for (worker, unit) in (0..config.concurrency)
            .filter_map(|worker| Some((worker, config.workload.unit_for(worker)?.clone())))
        {
            let context = WorkerContext {
                worker,
                unit,
                state: Arc::clone(&state),
                limiter: limiter.clone(),
                executor: executor.clone(),
                sink: sink.clone(),
            };
            workers.push(tokio::spawn(run_worker(context)));
        }
        drop(sink);

        let stop = StopHandle {
            state: Arc::clone(&state),
        };
        let deadline = config
            .deadline()
            .map(|duration| spawn_deadline_trigger(stop.clone(), duration));

        info!(
            "Started {} workers (budget: {}, rate: {})",
            workers.len(),
            config
                .budget()
                .map_or_else(|| "unbounded".to_owned(), |budget| budget.to_string()),
            if limiter.is_unlimited() {
                "unlimited".to_owned()
            } else {
                format!("{}/s", config.rate_limit)
            }
        );

        Ok(RunHandle {
            state,
            stop,
            workers,
            aggregator,
            deadline,
            started,
        })
    }
}

/// A running load test.
pub struct RunHandle {
    state: Arc<RunState>,
    stop: StopHandle,
    workers: Vec<JoinHandle<()>>,
    aggregator: JoinHandle<Aggregate>,
    deadline: Option<JoinHandle<()>>,
    started: Instant,
}

impl RunHandle {
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Requests a stop; see [`StopHandle::stop`].
    pub fn stop(&self, cause: StopCause) -> bool {
        self.stop.stop(cause)
    }

    #[must_use]
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Waits for every worker to drain and returns the final report.
    ///
    /// # Errors
    ///
    /// Returns an error if the stats collector task panicked.
    pub async fn wait(self) -> AppResult<Report> {
        let RunHandle {
            state,
            workers,
            aggregator,
            deadline,
            started,
            ..
        } = self;

        for worker in workers {
            if let Err(err) = worker.await {
                warn!("Worker task failed: {}", err);
            }
        }
        let elapsed = started.elapsed();
        if let Some(deadline) = deadline {
            deadline.abort();
        }

        let aggregate = aggregator.await?;
        debug!(
            "Run finished: {} units, {} requests, {} budget slots left",
            aggregate.units(),
            aggregate.requests(),
            state
                .remaining()
                .map_or_else(|| "unbounded".to_owned(), |left| left.to_string())
        );
        Ok(aggregate.snapshot(elapsed, state.stop_cause(), state.peak_in_flight()))
    }
}

struct WorkerContext {
    worker: usize,
    unit: ExecutionUnit,
    state: Arc<RunState>,
    limiter: RateLimiter,
    executor: RequestExecutor,
    sink: StatsSink,
}

async fn run_worker(context: WorkerContext) {
    let WorkerContext {
        worker,
        unit,
        state,
        limiter,
        executor,
        sink,
    } = context;
    let mut seq: u64 = 0;
    loop {
        if state.is_stopped() || !state.try_claim() {
            break;
        }
        if !limiter.acquire(&state).await {
            break;
        }
        let body_context = BodyContext {
            worker,
            seq,
            step: 0,
        };
        let in_flight = state.enter();
        if state.is_stopped() {
            break;
        }
        let result = executor.execute(&unit, &body_context).await;
        if !sink.ingest(result).await {
            warn!("Stats collector closed; worker {} exiting", worker);
            break;
        }
        in_flight.complete();
        seq = seq.saturating_add(1);
    }
    debug!("Worker {} finished after {} units", worker, seq);
}
