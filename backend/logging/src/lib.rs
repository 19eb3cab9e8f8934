//! Structured logging for the sketchnote workspace.
//!
//! Handles subscriber setup (console plus optional NDJSON file rotation) and
//! scrubbing of provider keys from text before it is logged.

pub mod logger;
pub mod redact;

pub use logger::{LoggingSettings, init_logger};
pub use redact::redact_sensitive_data;
