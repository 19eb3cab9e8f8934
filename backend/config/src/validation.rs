//! Config validation with user-friendly error messages.

use crate::schema::SketchnoteConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &SketchnoteConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_provider(config, &mut report);
    validate_server(config, &mut report);
    report
}

fn validate_provider(config: &SketchnoteConfig, report: &mut ValidationReport) {
    let provider = &config.provider;
    if provider.offline {
        return;
    }
    if provider.api_key.as_deref().map(str::trim).unwrap_or("").is_empty() {
        report.warn(
            "provider.apiKey",
            "No API key configured; every workflow will start at the setup step",
        );
    }
    if !provider.base_url.starts_with("http://") && !provider.base_url.starts_with("https://") {
        report.error("provider.baseUrl", "Base URL must start with http:// or https://");
    }
    if provider.analysis_model.trim().is_empty() {
        report.error("provider.analysisModel", "Model id cannot be empty");
    }
    if provider.image_model.trim().is_empty() {
        report.error("provider.imageModel", "Model id cannot be empty");
    }
}

fn validate_server(config: &SketchnoteConfig, report: &mut ValidationReport) {
    let server = &config.server;
    if server.port == 0 {
        report.error("server.port", "Port must be > 0");
    } else if server.port < 1024 {
        report.warn(
            "server.port",
            format!("Port {} requires elevated privileges; consider using a port >= 1024", server.port),
        );
    }
    if server.bind.trim().is_empty() {
        report.error("server.bind", "Bind address cannot be empty");
    }
    if server.session_idle_secs == 0 {
        report.warn(
            "server.sessionIdleSecs",
            "Idle sessions are never evicted; abandoned uploads stay in memory",
        );
    }
}
