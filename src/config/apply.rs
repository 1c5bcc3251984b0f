use std::path::PathBuf;

use clap::ArgMatches;

use crate::args::LoadArgs;
use crate::args::parsers::parse_basic_auth;
use crate::error::{AppError, AppResult, ConfigError, ValidationError};

use super::types::ConfigFile;

mod scenario;
mod util;

use scenario::{ScenarioDefaults, parse_scenario};
use util::{ensure_positive_u64, ensure_positive_usize, is_cli, parse_headers};

/// Applies configuration values to CLI arguments. Values given on the
/// command line always win.
///
/// # Errors
///
/// Returns an error when config values are invalid.
pub fn apply_config(args: &mut LoadArgs, matches: &ArgMatches, config: &ConfigFile) -> AppResult<()> {
    apply_request(args, matches, config)?;
    apply_load(args, matches, config)?;
    apply_transport(args, matches, config);
    apply_output(args, matches, config)?;

    if let Some(scenario) = config.scenario.as_ref() {
        let defaults = ScenarioDefaults {
            base_url: args.url.clone(),
            method: args.method,
            body: args.data.clone(),
            headers: args.headers.clone(),
        };
        let parsed = parse_scenario(scenario, &defaults)?;
        if !is_cli(matches, "concurrency") && config.concurrency.is_none() && !parsed.users.is_empty()
        {
            args.concurrency = ensure_positive_usize(parsed.users.len(), "concurrency")?;
        }
        args.scenario = Some(parsed);
    }
    Ok(())
}

fn apply_request(args: &mut LoadArgs, matches: &ArgMatches, config: &ConfigFile) -> AppResult<()> {
    if !is_cli(matches, "url")
        && let Some(url) = config.url.clone()
    {
        args.url = Some(url);
    }

    if !is_cli(matches, "method")
        && let Some(method) = config.method
    {
        args.method = method;
    }

    if !is_cli(matches, "headers")
        && let Some(headers) = config.headers.as_ref()
    {
        args.headers = parse_headers(headers)?;
    }

    if !is_cli(matches, "data")
        && !is_cli(matches, "data_file")
        && let Some(data) = config.data.clone()
    {
        args.data = Some(data);
    }

    if !is_cli(matches, "data_file")
        && !is_cli(matches, "data")
        && let Some(path) = config.data_file.as_ref()
    {
        args.data_file = Some(PathBuf::from(path));
    }

    if !is_cli(matches, "accept")
        && let Some(accept) = config.accept.clone()
    {
        args.accept = Some(accept);
    }

    if !is_cli(matches, "content_type")
        && let Some(content_type) = config.content_type.clone()
    {
        args.content_type = content_type;
    }

    if !is_cli(matches, "basic_auth")
        && let Some(auth) = config.basic_auth.as_deref()
    {
        let parsed = parse_basic_auth(auth).map_err(|source| {
            AppError::config(ConfigError::InvalidValue {
                field: "basic_auth",
                source,
            })
        })?;
        args.basic_auth = Some(parsed);
    }

    if !is_cli(matches, "host")
        && let Some(host) = config.host.clone()
    {
        args.host = Some(host);
    }
    Ok(())
}

fn apply_load(args: &mut LoadArgs, matches: &ArgMatches, config: &ConfigFile) -> AppResult<()> {
    if !is_cli(matches, "requests")
        && let Some(requests) = config.requests
    {
        args.requests = ensure_positive_u64(requests, "requests")?;
    }

    if !is_cli(matches, "concurrency")
        && let Some(concurrency) = config.concurrency
    {
        args.concurrency = ensure_positive_usize(concurrency, "concurrency")?;
    }

    if !is_cli(matches, "rate")
        && let Some(rate) = config.rate
    {
        if !rate.is_finite() || rate < 0.0 {
            return Err(AppError::config(ConfigError::InvalidValue {
                field: "rate",
                source: ValidationError::InvalidRateLimit { value: rate },
            }));
        }
        args.rate = rate;
    }

    if !is_cli(matches, "duration")
        && let Some(duration) = config.duration.as_ref()
    {
        args.duration = Some(duration.to_duration("duration")?);
    }

    if !is_cli(matches, "timeout_secs")
        && let Some(timeout) = config.timeout
    {
        args.timeout_secs = timeout;
    }
    Ok(())
}

fn apply_transport(args: &mut LoadArgs, matches: &ArgMatches, config: &ConfigFile) {
    if !is_cli(matches, "proxy")
        && let Some(proxy) = config.proxy.clone()
    {
        args.proxy = Some(proxy);
    }
    if !is_cli(matches, "http2")
        && let Some(http2) = config.http2
    {
        args.http2 = http2;
    }
    if !is_cli(matches, "disable_compression")
        && let Some(disable) = config.disable_compression
    {
        args.disable_compression = disable;
    }
    if !is_cli(matches, "disable_keepalive")
        && let Some(disable) = config.disable_keepalive
    {
        args.disable_keepalive = disable;
    }
    if !is_cli(matches, "disable_redirects")
        && let Some(disable) = config.disable_redirects
    {
        args.disable_redirects = disable;
    }
}

fn apply_output(args: &mut LoadArgs, matches: &ArgMatches, config: &ConfigFile) -> AppResult<()> {
    if !is_cli(matches, "output")
        && let Some(output) = config.output
    {
        args.output = output;
    }
    if !is_cli(matches, "output_file")
        && let Some(path) = config.output_file.as_ref()
    {
        args.output_file = Some(PathBuf::from(path));
    }
    if !is_cli(matches, "max_samples")
        && let Some(max_samples) = config.max_samples
    {
        args.max_samples = ensure_positive_usize(max_samples, "max_samples")?;
    }
    if !is_cli(matches, "cpus")
        && let Some(cpus) = config.cpus
    {
        args.cpus = Some(ensure_positive_usize(cpus, "cpus")?);
    }
    if !is_cli(matches, "verbose")
        && let Some(verbose) = config.verbose
    {
        args.verbose = verbose;
    }
    Ok(())
}
