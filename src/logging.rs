//! Tracing subscriber setup for the `fcctl` binary.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Where log lines go.
#[derive(Debug, Clone, Copy)]
pub enum LogOutput<'a> {
    Stderr,
    /// Daily rolling `fcctl.log` files in this directory.
    Directory(&'a Path),
    /// Nothing is written; used when the terminal belongs to the dashboard.
    Discard,
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `level`.
///
/// Keep the returned guard alive for the life of the program, or buffered file
/// output is lost. Does nothing if a subscriber is already installed.
pub fn init_logging(level: &str, output: LogOutput<'_>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match output {
        LogOutput::Stderr => {
            let _ = builder.with_writer(std::io::stderr).try_init();
            None
        }
        LogOutput::Directory(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "fcctl.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = builder.with_ansi(false).with_writer(writer).try_init();
            Some(guard)
        }
        LogOutput::Discard => {
            let _ = builder.with_writer(std::io::sink).try_init();
            None
        }
    }
}
