use thiserror::Error;

/// Top-level error type for the sketchnote client and its collaborators.
#[derive(Debug, Error)]
pub enum SketchError {
    /// The provider answered with a non-success status. `message` is the
    /// provider's own error text, passed through unchanged.
    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("no image generated")]
    NoImageProduced,

    #[error("provider returned an empty response")]
    EmptyResponse,

    #[error("provider response did not match the expected schema: {0}")]
    InvalidResponse(String),

    #[error("no API key has been selected")]
    MissingCredential,

    #[error("invalid image data: {0}")]
    InvalidImage(String),
}
