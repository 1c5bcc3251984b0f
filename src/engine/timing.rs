//! Connection-phase instrumentation for the shared client.
//!
//! reqwest exposes no per-request trace hooks, so the executor scopes a
//! [`PhaseClock`] around each exchange with a task-local. The custom resolver
//! and the connector layer pick it up when (and only when) the exchange opens
//! a new connection.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use thiserror::Error;
use tokio::time::Instant;
use tower_layer::Layer;
use tower_service::Service;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

tokio::task_local! {
    static PHASES: Arc<PhaseClock>;
}

#[derive(Debug, Default)]
pub(crate) struct PhaseClock {
    dns_nanos: AtomicU64,
    connect_nanos: AtomicU64,
}

impl PhaseClock {
    fn record_dns(&self, elapsed: Duration) {
        self.dns_nanos
            .fetch_add(duration_nanos(elapsed), Ordering::AcqRel);
    }

    fn record_connect(&self, elapsed: Duration) {
        self.connect_nanos
            .fetch_add(duration_nanos(elapsed), Ordering::AcqRel);
    }

    pub(crate) fn dns(&self) -> Duration {
        Duration::from_nanos(self.dns_nanos.load(Ordering::Acquire))
    }

    /// Full connector time, DNS included.
    pub(crate) fn connect(&self) -> Duration {
        Duration::from_nanos(self.connect_nanos.load(Ordering::Acquire))
    }
}

fn duration_nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

pub(crate) async fn with_phase_clock<F>(clock: Arc<PhaseClock>, future: F) -> F::Output
where
    F: Future,
{
    PHASES.scope(clock, future).await
}

fn current_clock() -> Option<Arc<PhaseClock>> {
    PHASES.try_with(Arc::clone).ok()
}

#[derive(Debug, Error)]
#[error("failed to resolve '{host}': {source}")]
pub(crate) struct ResolveError {
    host: String,
    #[source]
    source: std::io::Error,
}

/// System resolver that reports lookup time to the active [`PhaseClock`].
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TimedResolver;

impl Resolve for TimedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let clock = current_clock();
        let host = name.as_str().to_owned();
        Box::pin(async move {
            let started = Instant::now();
            let lookup = tokio::net::lookup_host((host.clone(), 0)).await;
            if let Some(clock) = clock.as_ref() {
                clock.record_dns(started.elapsed());
            }
            match lookup {
                Ok(addrs) => {
                    let addrs: Vec<SocketAddr> = addrs.collect();
                    let addrs: Addrs = Box::new(addrs.into_iter());
                    Ok(addrs)
                }
                Err(source) => {
                    let error: BoxError = Box::new(ResolveError { host, source });
                    Err(error)
                }
            }
        })
    }
}

/// Connector layer timing dial plus TLS for fresh connections.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ConnectTimingLayer;

impl<S> Layer<S> for ConnectTimingLayer {
    type Service = ConnectTiming<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConnectTiming { inner }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ConnectTiming<S> {
    inner: S,
}

impl<S, Req> Service<Req> for ConnectTiming<S>
where
    S: Service<Req>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Req) -> Self::Future {
        let connecting = self.inner.call(request);
        match current_clock() {
            Some(clock) => Box::pin(async move {
                let started = Instant::now();
                // Re-scope so the resolver, polled inside the connector, sees the clock.
                let result = PHASES.scope(Arc::clone(&clock), connecting).await;
                clock.record_connect(started.elapsed());
                result
            }),
            None => Box::pin(connecting),
        }
    }
}
