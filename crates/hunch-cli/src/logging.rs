use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const CRATES: &[&str] = &["hunch", "hunch_cli", "hunch_core", "hunch_predict"];

fn crate_directives(level: &str) -> String {
    CRATES
        .iter()
        .map(|c| format!("{c}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Terminal gets warnings (debug with `verbose`), the log file gets
/// everything at debug. `RUST_LOG` overrides the terminal filter.
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init_logging(logs_dir: &Path, verbose: bool) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, "hunch.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new(format!("warn,{}", crate_directives("debug")))
        } else {
            EnvFilter::new("warn")
        }
    });
    let file_filter = EnvFilter::new(format!("info,{}", crate_directives("debug")));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(stderr_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .init();

    tracing::debug!("logging initialized, logs directory: {:?}", logs_dir);
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_cover_every_crate() {
        assert_eq!(
            crate_directives("debug"),
            "hunch=debug,hunch_cli=debug,hunch_core=debug,hunch_predict=debug"
        );
    }
}
