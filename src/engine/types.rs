use std::sync::Arc;
use std::time::Duration;

/// Classification of a request that never produced a usable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    Timeout,
    Dns,
    Connect,
    Tls,
    Redirect,
    Body,
    Request,
    Other,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Dns => "dns",
            ErrorKind::Connect => "connect",
            ErrorKind::Tls => "tls",
            ErrorKind::Redirect => "redirect",
            ErrorKind::Body => "body",
            ErrorKind::Request => "request",
            ErrorKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StepOutcome {
    Status(u16),
    Failed(ErrorKind),
}

impl StepOutcome {
    /// A step succeeds when the server answered with a 2xx status.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, StepOutcome::Status(200..=299))
    }
}

/// Per-phase timing of one exchange.
///
/// `dns` and `connect` are only non-zero when the exchange opened a fresh
/// connection. `connect` covers the TCP dial and the TLS handshake, `wait`
/// covers writing the request and waiting for the response head, `read`
/// covers draining the body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct LatencyBreakdown {
    pub total: Duration,
    pub dns: Duration,
    pub connect: Duration,
    pub wait: Duration,
    pub read: Duration,
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub label: Arc<str>,
    pub outcome: StepOutcome,
    pub timing: LatencyBreakdown,
    pub response_bytes: u64,
    /// Time between the run start and the moment this step was issued.
    pub offset: Duration,
}

#[derive(Debug, Clone)]
pub struct UnitResult {
    pub worker: usize,
    pub steps: Vec<StepResult>,
}

impl UnitResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|step| step.outcome.is_success())
    }
}
