use crate::args::LoadArgs;
use crate::engine::{RunBound, RunConfig, TransportOptions};
use crate::error::AppResult;
use crate::workload::build_workload;

/// Maps parsed arguments onto the engine configuration. A duration turns the
/// request count off.
pub(super) fn build_run_config(args: &LoadArgs) -> AppResult<RunConfig> {
    let workload = build_workload(args)?;
    let bound = match args.duration {
        Some(duration) => RunBound::Duration(duration),
        None => RunBound::Requests(args.requests.get()),
    };

    let mut config = RunConfig::new(workload, args.concurrency.get(), bound);
    config.rate_limit = args.rate;
    config.timeout = args.timeout();
    config.max_samples = args.max_samples.get();
    config.transport = TransportOptions {
        disable_compression: args.disable_compression,
        disable_keepalive: args.disable_keepalive,
        disable_redirects: args.disable_redirects,
        http2: args.http2,
        proxy: args.proxy.clone(),
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;

    use super::*;
    use crate::error::AppError;

    fn parse(args: &[&str]) -> AppResult<LoadArgs> {
        LoadArgs::try_parse_from(args)
            .map_err(|err| AppError::validation(format!("Expected Ok, got Err: {}", err)))
    }

    #[test]
    fn duration_replaces_request_budget() -> AppResult<()> {
        let args = parse(&["volley", "-n", "10", "-z", "3s", "-q", "5", "http://localhost"])?;
        let config = build_run_config(&args)?;
        if config.bound != RunBound::Duration(Duration::from_secs(3)) {
            return Err(AppError::validation("Expected a duration bound"));
        }
        if config.budget().is_some() {
            return Err(AppError::validation("Duration runs have no budget"));
        }
        if (config.rate_limit - 5.0).abs() > f64::EPSILON {
            return Err(AppError::validation("Rate not carried over"));
        }
        Ok(())
    }

    #[test]
    fn transport_flags_are_carried_over() -> AppResult<()> {
        let args = parse(&[
            "volley",
            "-n",
            "10",
            "-c",
            "2",
            "-t",
            "0",
            "--h2",
            "--disable-keepalive",
            "--disable-redirects",
            "--disable-compression",
            "-x",
            "http://127.0.0.1:3128",
            "http://localhost",
        ])?;
        let config = build_run_config(&args)?;
        if config.bound != RunBound::Requests(10) || config.concurrency != 2 {
            return Err(AppError::validation("Unexpected bound or concurrency"));
        }
        if config.timeout.is_some() {
            return Err(AppError::validation("Zero timeout disables the timeout"));
        }
        let expected = TransportOptions {
            disable_compression: true,
            disable_keepalive: true,
            disable_redirects: true,
            http2: true,
            proxy: Some("http://127.0.0.1:3128".to_owned()),
        };
        if config.transport != expected {
            return Err(AppError::validation("Transport options differ"));
        }
        config.validate()
    }
}
