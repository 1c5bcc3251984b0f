use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, Response, redirect::Policy};
use tokio::time::Instant;
use tracing::debug;

use crate::error::{AppError, AppResult, HttpError, ValidationError};

use super::config::RunConfig;
use super::timing::{ConnectTimingLayer, PhaseClock, ResolveError, TimedResolver, with_phase_clock};
use super::types::{ErrorKind, LatencyBreakdown, StepOutcome, StepResult, UnitResult};
use super::unit::{BodyContext, ExecutionUnit, Step};

/// Idle connections kept per host, bounded like the concurrency.
const MAX_IDLE_PER_HOST: usize = 500;
const MAX_REDIRECTS: usize = 10;

/// Runs execution units on one shared client and never fails: every
/// transport problem becomes a classified [`StepOutcome::Failed`].
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    timeout: Option<Duration>,
    run_start: Instant,
}

impl RequestExecutor {
    #[must_use]
    pub const fn new(client: Client, timeout: Option<Duration>, run_start: Instant) -> Self {
        Self {
            client,
            timeout,
            run_start,
        }
    }

    /// Builds the shared client for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error when the proxy is malformed or the client cannot be built.
    pub fn from_config(config: &RunConfig, run_start: Instant) -> AppResult<Self> {
        let client = build_client(config)?;
        Ok(Self::new(client, config.timeout, run_start))
    }

    /// Runs every step of `unit` in order. A failed step does not stop the
    /// steps after it.
    pub async fn execute(&self, unit: &ExecutionUnit, context: &BodyContext) -> UnitResult {
        let mut steps = Vec::with_capacity(unit.steps.len());
        for (index, step) in unit.steps.iter().enumerate() {
            let step_context = BodyContext {
                step: index,
                ..*context
            };
            steps.push(self.execute_step(step, &step_context).await);
        }
        UnitResult {
            worker: context.worker,
            steps,
        }
    }

    async fn execute_step(&self, step: &Step, context: &BodyContext) -> StepResult {
        let started = Instant::now();
        let offset = started.saturating_duration_since(self.run_start);
        let request = match step.request.build(&self.client, context) {
            Ok(request) => request,
            Err(err) => {
                debug!("Failed to build request for step '{}': {}", step.label, err);
                return StepResult {
                    label: Arc::clone(&step.label),
                    outcome: StepOutcome::Failed(ErrorKind::Request),
                    timing: LatencyBreakdown::default(),
                    response_bytes: 0,
                    offset,
                };
            }
        };

        let clock = Arc::new(PhaseClock::default());
        let exchange = with_phase_clock(Arc::clone(&clock), self.exchange(request));
        let exchange = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, exchange).await {
                Ok(exchange) => exchange,
                Err(_) => Exchange::failed(ErrorKind::Timeout, None),
            },
            None => exchange.await,
        };
        let finished = Instant::now();
        if let StepOutcome::Failed(kind) = exchange.outcome {
            debug!("Step '{}' failed: {}", step.label, kind);
        }

        StepResult {
            label: Arc::clone(&step.label),
            outcome: exchange.outcome,
            timing: breakdown(&clock, started, exchange.headers_at, finished),
            response_bytes: exchange.response_bytes,
            offset,
        }
    }

    async fn exchange(&self, request: reqwest::Request) -> Exchange {
        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                debug!("Request failed: {}", err);
                return Exchange::failed(classify_error(&err), None);
            }
        };
        let headers_at = Instant::now();
        let status = response.status().as_u16();
        match drain_response_body(response).await {
            Ok(response_bytes) => Exchange {
                outcome: StepOutcome::Status(status),
                headers_at: Some(headers_at),
                response_bytes,
            },
            Err(err) => {
                debug!("Failed to read response body: {}", err);
                let kind = if err.is_timeout() {
                    ErrorKind::Timeout
                } else {
                    ErrorKind::Body
                };
                Exchange::failed(kind, Some(headers_at))
            }
        }
    }
}

struct Exchange {
    outcome: StepOutcome,
    headers_at: Option<Instant>,
    response_bytes: u64,
}

impl Exchange {
    const fn failed(kind: ErrorKind, headers_at: Option<Instant>) -> Self {
        Self {
            outcome: StepOutcome::Failed(kind),
            headers_at,
            response_bytes: 0,
        }
    }
}

fn breakdown(
    clock: &PhaseClock,
    started: Instant,
    headers_at: Option<Instant>,
    finished: Instant,
) -> LatencyBreakdown {
    let total = finished.saturating_duration_since(started);
    let dns = clock.dns();
    let connect_total = clock.connect();
    let head = headers_at.map_or(total, |at| at.saturating_duration_since(started));
    LatencyBreakdown {
        total,
        dns,
        connect: connect_total.saturating_sub(dns),
        wait: head.saturating_sub(connect_total),
        read: total.saturating_sub(head),
    }
}

async fn drain_response_body(response: Response) -> Result<u64, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut total_bytes: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        total_bytes = total_bytes.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
    }
    Ok(total_bytes)
}

/// Maps a reqwest failure onto the error taxonomy used in reports.
pub(crate) fn classify_error(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        return ErrorKind::Timeout;
    }
    if err.is_redirect() {
        return ErrorKind::Redirect;
    }
    if chain_has_resolve_error(err) || chain_mentions(err, &["dns error"]) {
        return ErrorKind::Dns;
    }
    if chain_mentions(err, &["certificate", "tls", "ssl", "handshake"]) {
        return ErrorKind::Tls;
    }
    if err.is_connect() {
        return ErrorKind::Connect;
    }
    if err.is_body() || err.is_decode() {
        return ErrorKind::Body;
    }
    if err.is_request() || err.is_builder() {
        return ErrorKind::Request;
    }
    ErrorKind::Other
}

fn chain_has_resolve_error(err: &reqwest::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(source) = current {
        if source.downcast_ref::<ResolveError>().is_some() {
            return true;
        }
        current = source.source();
    }
    false
}

fn chain_mentions(err: &reqwest::Error, needles: &[&str]) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(source) = current {
        let text = source.to_string().to_ascii_lowercase();
        if needles.iter().any(|needle| text.contains(needle)) {
            return true;
        }
        current = source.source();
    }
    false
}

/// Builds the client every worker shares, honouring the transport options.
///
/// # Errors
///
/// Returns an error when the proxy is malformed or the client cannot be built.
pub fn build_client(config: &RunConfig) -> AppResult<Client> {
    let transport = &config.transport;
    let mut builder = Client::builder()
        .dns_resolver(Arc::new(TimedResolver))
        .connector_layer(ConnectTimingLayer);

    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }

    builder = if transport.disable_redirects {
        builder.redirect(Policy::none())
    } else {
        builder.redirect(Policy::limited(MAX_REDIRECTS))
    };

    builder = if transport.disable_keepalive {
        builder.pool_max_idle_per_host(0)
    } else {
        builder.pool_max_idle_per_host(config.concurrency.min(MAX_IDLE_PER_HOST))
    };

    if transport.disable_compression {
        builder = builder.no_gzip();
    }

    if transport.http2 {
        let cleartext_only = config
            .workload
            .templates()
            .all(|template| template.url.scheme() == "http");
        if cleartext_only {
            builder = builder.http2_prior_knowledge();
        }
    } else {
        builder = builder.http1_only();
    }

    builder = match transport.proxy.as_deref() {
        Some(proxy) => {
            let proxy = reqwest::Proxy::all(proxy).map_err(|source| {
                AppError::validation(ValidationError::InvalidProxyUrl {
                    url: proxy.to_owned(),
                    source,
                })
            })?;
            builder.proxy(proxy)
        }
        None => builder.no_proxy(),
    };

    builder
        .build()
        .map_err(|source| AppError::http(HttpError::BuildClientFailed { source }))
}
