//! Console and optional file logging.
//!
//! `RUST_LOG` wins when set; otherwise `[log].level` applies to the nodeweave
//! crates and everything else logs at `warn`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nodeweave_core::config::LogConfig;

fn default_directives(level: &str) -> String {
    format!("nodeweave={},warn", level)
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process so buffered file output gets flushed.
pub fn init(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let (subscriber, guard) = build(config)?;
    subscriber.init();
    Ok(guard)
}

fn build(
    config: &LogConfig,
) -> anyhow::Result<(impl tracing::Subscriber + Send + Sync + 'static, Option<WorkerGuard>)> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.level)));

    let timed = config
        .include_timestamp
        .then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));
    let untimed = (!config.include_timestamp).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .without_time()
    });

    let (file_layer, guard) = match config.file {
        Some(ref file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("log file '{}' has no file name", file))?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(timed)
        .with(untimed)
        .with(file_layer);

    Ok((subscriber, guard))
}
