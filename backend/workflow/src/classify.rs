//! Mapping of model failures to what the user is told.

/// Provider error text that means the selected key is missing or invalid.
pub const CREDENTIAL_ERROR_MARKER: &str = "Requested entity was not found";

pub const ANALYSIS_FAILED_MESSAGE: &str = "Failed to analyze note. Please try a clearer image.";
pub const CREDENTIAL_FAILED_MESSAGE: &str = "API Key issue. Please re-select your key.";
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate sketchnote. Please try again.";

/// Whether any error in the chain carries the credential marker.
pub fn is_credential_failure(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.to_string().contains(CREDENTIAL_ERROR_MARKER))
}
