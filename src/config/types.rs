use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::args::{HttpMethod, OutputFormat, parse_duration_arg};
use crate::error::{AppError, AppResult, ConfigError};

/// Every CLI option plus an optional request scenario.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    pub headers: Option<Vec<String>>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub data: Option<String>,
    pub data_file: Option<String>,
    pub basic_auth: Option<String>,
    pub host: Option<String>,
    pub proxy: Option<String>,
    pub requests: Option<u64>,
    pub concurrency: Option<usize>,
    pub rate: Option<f64>,
    pub duration: Option<DurationValue>,
    /// Per-request timeout in seconds, 0 disables it.
    pub timeout: Option<u64>,
    pub http2: Option<bool>,
    pub disable_compression: Option<bool>,
    pub disable_keepalive: Option<bool>,
    pub disable_redirects: Option<bool>,
    pub output: Option<OutputFormat>,
    pub output_file: Option<String>,
    pub max_samples: Option<usize>,
    pub cpus: Option<usize>,
    pub verbose: Option<bool>,
    pub scenario: Option<ScenarioConfig>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ScenarioConfig {
    pub base_url: Option<String>,
    pub method: Option<HttpMethod>,
    pub headers: Option<Vec<String>>,
    pub data: Option<String>,
    pub vars: Option<BTreeMap<String, String>>,
    pub users: Option<Vec<String>>,
    pub steps: Vec<ScenarioStepConfig>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ScenarioStepConfig {
    pub name: Option<String>,
    pub method: Option<HttpMethod>,
    pub url: Option<String>,
    pub path: Option<String>,
    pub headers: Option<Vec<String>>,
    #[serde(alias = "body")]
    pub data: Option<String>,
    pub vars: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self, field: &'static str) -> AppResult<Duration> {
        let parsed = match self {
            DurationValue::Seconds(secs) => parse_duration_arg(&secs.to_string()),
            DurationValue::Text(text) => parse_duration_arg(text),
        };
        parsed.map_err(|source| AppError::config(ConfigError::InvalidDuration { field, source }))
    }
}
