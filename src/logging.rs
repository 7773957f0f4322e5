//! Logging setup.
//!
//! Interactive runs log to stderr behind an env filter. Scheduled runs
//! write a transcript file instead, truncated at the start of each run and
//! appended to throughout; it is a diagnostic record, not machine-parsed.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Stderr logging for interactive sessions.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Transcript logging for a scheduled run.
pub fn init_scheduled(path: &Path) -> std::io::Result<()> {
    let file = File::create(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("info"))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
