//! Structured Logger
//!
//! Wraps `tracing` to provide console output, optional JSON formatting,
//! daily-rolling NDJSON files, and environment-based level control.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// File name prefix for the rolling log files.
const LOG_FILE_PREFIX: &str = "sketchnote.log";

/// Logger options, usually taken from the `logging` section of the config.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is not set.
    pub level: String,
    /// Directory for rolling NDJSON files; `None` logs to the console only.
    pub dir: Option<PathBuf>,
    /// Emit console lines as JSON instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

/// Initialize the global subscriber. Calling it again is a no-op.
pub fn init_logger(settings: &LoggingSettings) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    // Rolling file appender: writes NDJSON to `<dir>/sketchnote.log.YYYY-MM-DD`
    let file_layer = settings.dir.as_ref().map(|dir| {
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
        fmt::layer().json().with_writer(appender).with_ansi(false)
    });

    let json_console = settings
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_console = (!settings.json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(true)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_console)
        .with(text_console)
        .with(file_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_does_not_panic() {
        let settings = LoggingSettings::default();
        init_logger(&settings);
        init_logger(&settings);
        tracing::info!("logger initialized");
    }
}
