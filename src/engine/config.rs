use std::time::Duration;

use crate::error::{AppError, AppResult, ValidationError};

use super::unit::Workload;

/// Default cap on latency samples kept for percentiles and the CSV dump.
pub const DEFAULT_MAX_SAMPLES: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunBound {
    /// Stop after this many units have been issued.
    Requests(u64),
    /// Issue units until the duration elapses. The request budget is unbounded.
    Duration(Duration),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    pub disable_compression: bool,
    pub disable_keepalive: bool,
    pub disable_redirects: bool,
    pub http2: bool,
    pub proxy: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub workload: Workload,
    pub concurrency: usize,
    pub bound: RunBound,
    /// Requests per second across all workers; 0 disables throttling.
    pub rate_limit: f64,
    pub timeout: Option<Duration>,
    pub transport: TransportOptions,
    pub max_samples: usize,
}

impl RunConfig {
    #[must_use]
    pub fn new(workload: Workload, concurrency: usize, bound: RunBound) -> Self {
        Self {
            workload,
            concurrency,
            bound,
            rate_limit: 0.0,
            timeout: None,
            transport: TransportOptions::default(),
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }

    #[must_use]
    pub const fn budget(&self) -> Option<u64> {
        match self.bound {
            RunBound::Requests(requests) => Some(requests),
            RunBound::Duration(_) => None,
        }
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        match self.bound {
            RunBound::Requests(_) => None,
            RunBound::Duration(duration) => Some(duration),
        }
    }

    /// Rejects configurations that cannot start a run.
    ///
    /// # Errors
    ///
    /// Returns a validation error for zero concurrency, a request budget
    /// below the concurrency, an invalid rate, an empty workload, a target
    /// that is not http(s), or a malformed proxy address.
    pub fn validate(&self) -> AppResult<()> {
        if self.concurrency == 0 {
            return Err(AppError::validation(ValidationError::ConcurrencyZero));
        }
        if let RunBound::Requests(requests) = self.bound {
            if requests == 0 {
                return Err(AppError::validation(ValidationError::RequestsZero));
            }
            let concurrency = u64::try_from(self.concurrency).unwrap_or(u64::MAX);
            if requests < concurrency {
                return Err(AppError::validation(
                    ValidationError::RequestsBelowConcurrency {
                        requests,
                        concurrency: self.concurrency,
                    },
                ));
            }
        }
        if !self.rate_limit.is_finite() || self.rate_limit < 0.0 {
            return Err(AppError::validation(ValidationError::InvalidRateLimit {
                value: self.rate_limit,
            }));
        }
        if self.workload.units.is_empty() {
            return Err(AppError::validation(ValidationError::EmptyWorkload));
        }
        for (index, unit) in self.workload.units.iter().enumerate() {
            if unit.steps.is_empty() {
                return Err(AppError::validation(ValidationError::EmptyUnit { index }));
            }
        }
        for template in self.workload.templates() {
            let scheme = template.url.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(AppError::validation(ValidationError::UnsupportedScheme {
                    url: template.url.to_string(),
                    scheme: scheme.to_owned(),
                }));
            }
        }
        if let Some(proxy) = self.transport.proxy.as_deref() {
            reqwest::Proxy::all(proxy).map_err(|source| {
                AppError::validation(ValidationError::InvalidProxyUrl {
                    url: proxy.to_owned(),
                    source,
                })
            })?;
        }
        Ok(())
    }
}
