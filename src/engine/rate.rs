use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{MissedTickBehavior, interval};

use super::state::RunState;

/// Global request-rate gate shared by every worker.
///
/// A ticker task adds one permit every `1/Q` seconds, never letting more
/// than a single permit accumulate, so idle periods do not turn into bursts.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    gate: Option<Arc<Semaphore>>,
}

impl RateLimiter {
    #[must_use]
    pub const fn unlimited() -> Self {
        Self { gate: None }
    }

    /// Starts the ticker for `rate` requests per second. Zero means unlimited.
    ///
    /// Must be called from within a tokio runtime when `rate > 0`.
    #[must_use]
    pub fn spawn(rate: f64, state: &Arc<RunState>) -> Self {
        let Some(period) = tick_period(rate) else {
            return Self::unlimited();
        };
        let gate = Arc::new(Semaphore::new(0));
        spawn_gate_ticker(Arc::downgrade(&gate), Arc::clone(state), period);
        Self { gate: Some(gate) }
    }

    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.gate.is_none()
    }

    /// Waits for the next permit. Returns `false` once a stop was requested.
    pub async fn acquire(&self, state: &RunState) -> bool {
        let Some(gate) = self.gate.as_ref() else {
            return !state.is_stopped();
        };
        tokio::select! {
            biased;
            () = state.stopped() => false,
            permit = gate.acquire() => match permit {
                Ok(permit) => {
                    permit.forget();
                    !state.is_stopped()
                }
                Err(_) => false,
            },
        }
    }
}

fn tick_period(rate: f64) -> Option<Duration> {
    if !rate.is_finite() || rate <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(rate.recip())
        .ok()
        .map(|period| period.max(Duration::from_nanos(1)))
}

fn spawn_gate_ticker(gate: Weak<Semaphore>, state: Arc<RunState>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                () = state.stopped() => break,
                _ = ticker.tick() => {
                    let Some(gate) = gate.upgrade() else {
                        break;
                    };
                    if gate.available_permits() == 0 {
                        gate.add_permits(1);
                    }
                }
            }
        }
        tracing::debug!("Rate limiter ticker stopped");
    });
}
