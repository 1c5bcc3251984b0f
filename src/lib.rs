//! `volley` drives concurrent HTTP load against a target and reports
//! latency and throughput.
//!
//! The [`engine`] module is usable on its own: build a [`engine::RunConfig`],
//! call [`engine::Work::start`] inside a tokio runtime and await
//! [`engine::RunHandle::wait`] for the [`engine::Report`]. The `volley` binary
//! wraps it with argument parsing, config files and report rendering.
pub mod args;
pub mod config;
pub mod engine;
pub mod error;
pub mod report;

mod entry;
mod system;
mod workload;

pub use entry::run;
