// ABOUTME: Logging setup: EnvFilter, pretty or JSON output, stderr or a daily rolling file
// ABOUTME: Config loading runs under a temporary stderr subscriber so loader warnings are kept

use anyhow::{Context, Result};
use bcbot_core::config::{Config, LogFormat};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{writer::BoxMakeWriter, MakeWriter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
}

/// Load the config, logging to stderr until the configured logger exists
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    load_config_with(path, std::io::stderr)
}

/// Load the config with loader output sent to `writer`
pub fn load_config_with<W>(path: Option<&Path>, writer: W) -> Result<Config>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .finish();
    tracing::subscriber::with_default(subscriber, || Config::load(path))
}

/// Install the process-wide subscriber. Keep the guard alive for file logging.
pub fn init_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    // stdout belongs to the stdio transport
    let (writer, guard) = match &config.logging.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "bcbot.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(writer);
    match config.logging.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt_layer.json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt_layer)
            .init(),
    }

    Ok(guard)
}
