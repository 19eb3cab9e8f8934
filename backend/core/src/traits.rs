use anyhow::Result;
use async_trait::async_trait;

use crate::image::{GeneratedImage, SourceImage};
use crate::types::{GenerationSettings, StructuredNote};

/// The hosted multimodal model behind the two wizard calls.
///
/// Each call is a single request/response with no retry. Provider errors are
/// returned unchanged; classifying them for the user is the caller's job.
#[async_trait]
pub trait NoteModel: Send + Sync {
    /// Provider name (e.g., "gemini", "mock").
    fn name(&self) -> &str;

    /// Transcribe and analyze a photographed note.
    async fn analyze(&self, image: &SourceImage) -> Result<StructuredNote>;

    /// Render a new sketchnote image from an analyzed note.
    async fn generate(
        &self,
        note: &StructuredNote,
        settings: &GenerationSettings,
    ) -> Result<GeneratedImage>;
}

/// The hosting environment's key picker.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Whether a usable provider key has already been selected.
    async fn has_selected_credential(&self) -> bool;

    /// Open the key picker. Completion is not a confirmation that a key was
    /// actually chosen.
    async fn open_selector(&self) -> Result<()>;
}
