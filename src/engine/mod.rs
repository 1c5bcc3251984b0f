//! The load-generation engine.
//!
//! [`Work::start`] takes a validated [`RunConfig`], spawns `C` workers that
//! claim budget slots, pass through the shared [`RateLimiter`], run their
//! [`ExecutionUnit`] through the [`RequestExecutor`] and stream results into
//! the stats collector. [`RunHandle::wait`] drains everything into a
//! [`Report`].

pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod lifecycle;
pub mod rate;
pub mod state;
pub mod stats;
mod timing;
pub mod types;
pub mod unit;

#[cfg(test)]
mod tests;

pub use config::{DEFAULT_MAX_SAMPLES, RunBound, RunConfig, TransportOptions};
pub use dispatcher::{RunHandle, StopHandle, Work};
pub use executor::RequestExecutor;
pub use lifecycle::{spawn_deadline_trigger, spawn_interrupt_trigger};
pub use rate::RateLimiter;
pub use state::{RunState, StopCause};
pub use stats::{Aggregate, Report, StatsAggregator, StatsSink};
pub use types::{ErrorKind, LatencyBreakdown, StepOutcome, StepResult, UnitResult};
pub use unit::{
    BodyContext, BodyProducer, BodySource, ExecutionUnit, RequestTemplate, Step, Workload,
};
