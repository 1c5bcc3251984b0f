use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

/// Why a run was stopped before its budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    Interrupt,
    Deadline,
    Manual,
}

impl StopCause {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StopCause::Interrupt => "interrupt",
            StopCause::Deadline => "deadline",
            StopCause::Manual => "manual",
        }
    }
}

/// Shared, run-scoped coordination state.
///
/// The budget is claimed with a CAS loop so exactly `N` units are ever
/// issued. The stop signal is a watch channel: the first `stop` wins and
/// later calls are no-ops.
#[derive(Debug)]
pub struct RunState {
    remaining: Option<AtomicU64>,
    stop_tx: watch::Sender<Option<StopCause>>,
    in_flight: AtomicU64,
    peak_in_flight: AtomicU64,
    completed: AtomicU64,
}

impl RunState {
    #[must_use]
    pub fn new(budget: Option<u64>) -> Self {
        let (stop_tx, _) = watch::channel(None);
        Self {
            remaining: budget.map(AtomicU64::new),
            stop_tx,
            in_flight: AtomicU64::new(0),
            peak_in_flight: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    /// Claims one slot of the request budget. Always succeeds when unbounded.
    pub fn try_claim(&self) -> bool {
        let Some(remaining) = self.remaining.as_ref() else {
            return true;
        };
        remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                left.checked_sub(1)
            })
            .is_ok()
    }

    #[must_use]
    pub fn remaining(&self) -> Option<u64> {
        self.remaining
            .as_ref()
            .map(|remaining| remaining.load(Ordering::Acquire))
    }

    /// Requests a stop. Returns `true` only for the call that set the flag.
    pub fn stop(&self, cause: StopCause) -> bool {
        self.stop_tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(cause);
            true
        })
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop_tx.borrow().is_some()
    }

    #[must_use]
    pub fn stop_cause(&self) -> Option<StopCause> {
        *self.stop_tx.borrow()
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        let mut stop_rx = self.stop_tx.subscribe();
        if let Err(err) = stop_rx.wait_for(Option::is_some).await.map(drop) {
            tracing::debug!("Stop channel closed: {}", err);
        }
    }

    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn peak_in_flight(&self) -> u64 {
        self.peak_in_flight.load(Ordering::Acquire)
    }

    /// Units that ran to the end and were handed to the stats collector.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Marks a unit as started. The caller must re-check [`Self::is_stopped`]
    /// after entering so no unit starts once the stop flag is visible.
    pub(crate) fn enter(&self) -> InFlightGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        InFlightGuard { state: self }
    }
}

pub(crate) struct InFlightGuard<'state> {
    state: &'state RunState,
}

impl InFlightGuard<'_> {
    /// Counts the unit as completed before it leaves the in-flight gauge.
    pub(crate) fn complete(self) {
        self.state.completed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut current = self.state.in_flight.load(Ordering::Acquire);
        loop {
            let next = current.saturating_sub(1);
            match self.state.in_flight.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}
