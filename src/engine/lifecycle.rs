//! Triggers that end a run early. Both route through the same idempotent
//! stop, so whichever fires first is the recorded cause.

use std::time::Duration;

use tokio::task::JoinHandle;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use super::dispatcher::StopHandle;
use super::state::StopCause;

/// Stops the run on Ctrl-C (and SIGTERM on unix). Exits quietly once the
/// run was stopped by something else.
pub fn spawn_interrupt_trigger(stop: StopHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut term_signal = match signal(SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                tracing::warn!("Failed to register SIGTERM handler: {}", err);
                None
            }
        };

        #[cfg(unix)]
        {
            tokio::select! {
                () = stop.stopped() => {}
                _ = tokio::signal::ctrl_c() => {
                    stop.stop(StopCause::Interrupt);
                }
                () = async {
                    if let Some(signal) = term_signal.as_mut() {
                        signal.recv().await;
                    } else {
                        std::future::pending::<()>().await;
                    }
                } => {
                    stop.stop(StopCause::Interrupt);
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                () = stop.stopped() => {}
                _ = tokio::signal::ctrl_c() => {
                    stop.stop(StopCause::Interrupt);
                }
            }
        }
    })
}

/// Stops the run once `after` has elapsed.
pub fn spawn_deadline_trigger(stop: StopHandle, after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = stop.stopped() => {}
            () = tokio::time::sleep(after) => {
                stop.stop(StopCause::Deadline);
            }
        }
    })
}
