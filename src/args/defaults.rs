pub(crate) const DEFAULT_USER_AGENT: &str = concat!("volley/", env!("CARGO_PKG_VERSION"));

pub(crate) const DEFAULT_REQUESTS: &str = "200";
pub(crate) const DEFAULT_CONCURRENCY: &str = "50";
pub(crate) const DEFAULT_TIMEOUT_SECS: &str = "20";
pub(crate) const DEFAULT_CONTENT_TYPE: &str = "text/html";
pub(crate) const DEFAULT_MAX_SAMPLES: &str = "1000000";
