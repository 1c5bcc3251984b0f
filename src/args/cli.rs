use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_CONTENT_TYPE, DEFAULT_MAX_SAMPLES, DEFAULT_REQUESTS,
    DEFAULT_TIMEOUT_SECS,
};
use super::parsers::{
    parse_basic_auth, parse_duration_arg, parse_header, parse_positive_u64, parse_positive_usize,
    parse_rate,
};
use super::types::{HttpMethod, OutputFormat, PositiveU64, PositiveUsize, Scenario};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Async HTTP load generator - bounded or timed runs, global rate limiting, and per-phase latency breakdown."
)]
pub struct LoadArgs {
    /// Target URL (omit when the config file defines a scenario)
    pub url: Option<String>,

    /// Number of requests to run
    #[arg(short = 'n', long = "requests", default_value = DEFAULT_REQUESTS, value_parser = parse_positive_u64)]
    pub requests: PositiveU64,

    /// Number of workers to run concurrently
    #[arg(short = 'c', long = "concurrency", default_value = DEFAULT_CONCURRENCY, value_parser = parse_positive_usize)]
    pub concurrency: PositiveUsize,

    /// Rate limit in requests per second across all workers (0 = unlimited)
    #[arg(short = 'q', long = "rate", default_value = "0", value_parser = parse_rate)]
    pub rate: f64,

    /// Send requests for this long instead of a fixed count (e.g. 10s, 3m)
    #[arg(short = 'z', long = "duration", value_parser = parse_duration_arg)]
    pub duration: Option<Duration>,

    /// Per-request timeout in seconds (0 = no timeout)
    #[arg(short = 't', long = "timeout", default_value = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// HTTP method
    #[arg(short = 'm', long = "method", default_value = "get", ignore_case = true)]
    pub method: HttpMethod,

    /// Custom HTTP header 'Key: Value' (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body
    #[arg(short = 'd', long = "data")]
    pub data: Option<String>,

    /// Request body from file
    #[arg(short = 'D', long = "data-file", conflicts_with = "data")]
    pub data_file: Option<PathBuf>,

    /// HTTP Accept header
    #[arg(short = 'A', long = "accept")]
    pub accept: Option<String>,

    /// Content-Type header
    #[arg(short = 'T', long = "content-type", default_value = DEFAULT_CONTENT_TYPE)]
    pub content_type: String,

    /// Basic authentication 'username:password'
    #[arg(short = 'a', long = "basic-auth", value_parser = parse_basic_auth)]
    pub basic_auth: Option<(String, String)>,

    /// Host header override
    #[arg(long = "host")]
    pub host: Option<String>,

    /// HTTP proxy address (host:port or URL)
    #[arg(short = 'x', long = "proxy")]
    pub proxy: Option<String>,

    /// Enable HTTP/2
    #[arg(long = "h2")]
    pub http2: bool,

    /// Disable response compression
    #[arg(long = "disable-compression")]
    pub disable_compression: bool,

    /// Disable keep-alive; every request opens a new connection
    #[arg(long = "disable-keepalive")]
    pub disable_keepalive: bool,

    /// Do not follow HTTP redirects
    #[arg(long = "disable-redirects")]
    pub disable_redirects: bool,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t = OutputFormat::Summary)]
    pub output: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(long = "output-file")]
    pub output_file: Option<PathBuf>,

    /// Maximum latency samples kept for percentiles and CSV output
    #[arg(long = "max-samples", default_value = DEFAULT_MAX_SAMPLES, value_parser = parse_positive_usize)]
    pub max_samples: PositiveUsize,

    /// Number of runtime worker threads (defaults to the CPU count)
    #[arg(long = "cpus", value_parser = parse_positive_usize)]
    pub cpus: Option<PositiveUsize>,

    /// Path to config file (TOML or JSON); volley.toml/volley.json are used when present
    #[arg(long = "config")]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    #[arg(skip)]
    pub scenario: Option<Scenario>,
}

impl LoadArgs {
    /// Per-request timeout, `None` when disabled.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}
