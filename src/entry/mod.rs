mod plan;

use std::ffi::OsString;
use std::path::Path;

use clap::{ArgMatches, CommandFactory, FromArgMatches};

use crate::args::LoadArgs;
use crate::engine::{Work, spawn_interrupt_trigger};
use crate::error::AppResult;
use plan::build_run_config;

/// Parses the command line, runs the load test and prints the report.
///
/// # Errors
///
/// Returns an error for invalid arguments or configuration, a runtime that
/// cannot be built, or a report that cannot be written.
pub fn run() -> AppResult<()> {
    let Some((mut args, matches)) = parse_args()? else {
        return Ok(());
    };

    if let Some(config) = crate::config::load_config(args.config.as_deref())? {
        crate::config::apply_config(&mut args, &matches, &config)?;
    }

    crate::system::logger::init_logging(args.verbose);

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(cpus) = args.cpus {
        builder.worker_threads(cpus.get());
    }
    let runtime = builder.build()?;

    runtime.block_on(run_async(args))
}

fn parse_args() -> AppResult<Option<(LoadArgs, ArgMatches)>> {
    let mut cmd = LoadArgs::command();
    let raw_args: Vec<OsString> = std::env::args_os().collect();

    if should_show_help(&raw_args) {
        cmd.print_help()?;
        println!();
        return Ok(None);
    }

    let matches = cmd.get_matches_from(raw_args);
    let args = LoadArgs::from_arg_matches(&matches)?;

    Ok(Some((args, matches)))
}

fn should_show_help(raw_args: &[OsString]) -> bool {
    let treat_as_empty =
        matches!(raw_args, [] | [_]) || matches!(raw_args, [_, second] if second == "--");
    if !treat_as_empty {
        return false;
    }

    !has_default_config()
}

fn has_default_config() -> bool {
    crate::config::discover_config(Path::new(".")).is_some()
}

async fn run_async(args: LoadArgs) -> AppResult<()> {
    let config = build_run_config(&args)?;
    let handle = Work::start(config)?;
    let interrupt = spawn_interrupt_trigger(handle.stop_handle());

    let report = handle.wait().await;
    interrupt.abort();
    let report = report?;

    if report.requests == 0 {
        tracing::warn!("No requests completed.");
    }
    crate::report::emit(&report, args.output, args.output_file.as_deref()).await
}
