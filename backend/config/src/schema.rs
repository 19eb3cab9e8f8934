//! Sketchnote runtime configuration schema, typed for serde YAML/JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use sketchnote_core::GenerationSettings;
use sketchnote_logging::LoggingSettings;
use sketchnote_provider::gemini::{DEFAULT_ANALYSIS_MODEL, DEFAULT_BASE_URL, DEFAULT_IMAGE_MODEL};

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SESSION_IDLE_SECS: u32 = 3600;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SketchnoteConfig {
    pub provider: ProviderConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// Output settings a new workflow starts with.
    pub defaults: GenerationSettings,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// Provider key. Without one every workflow starts at the setup step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub analysis_model: String,
    pub image_model: String,
    /// Answer with canned results instead of calling the provider.
    pub offline: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            offline: false,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("analysis_model", &self.analysis_model)
            .field("image_model", &self.image_model)
            .field("offline", &self.offline)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Sessions untouched for this long are dropped. `0` keeps them forever.
    pub session_idle_secs: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn to_settings(&self) -> LoggingSettings {
        LoggingSettings {
            level: self.level.clone(),
            dir: self.dir.clone(),
            json: self.json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_api_key() {
        let provider = ProviderConfig {
            api_key: Some("AIza-secret".into()),
            ..Default::default()
        };
        let printed = format!("{provider:?}");
        assert!(!printed.contains("AIza-secret"));
        assert!(printed.contains("[REDACTED]"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: SketchnoteConfig =
            serde_yaml::from_str("logging:\n  json: true\n").unwrap();
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.provider.analysis_model, DEFAULT_ANALYSIS_MODEL);
        assert_eq!(config.server.address(), "127.0.0.1:8080");
    }
}
