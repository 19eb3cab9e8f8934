use sketchnote_core::{GeneratedImage, SourceImage, Step, StructuredNote};

/// The active step together with exactly the data that step needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Stage {
    /// Waiting for a provider key to be selected.
    #[default]
    Setup,
    /// Waiting for a photo.
    Import,
    /// Photo imported. `note` is kept when coming back from `Beautify` and is
    /// overwritten by the next successful analysis.
    Analyze {
        source: SourceImage,
        note: Option<StructuredNote>,
    },
    Beautify {
        source: SourceImage,
        note: StructuredNote,
    },
    Result {
        source: SourceImage,
        note: StructuredNote,
        image: GeneratedImage,
    },
}

impl Stage {
    pub fn step(&self) -> Step {
        match self {
            Stage::Setup => Step::Setup,
            Stage::Import => Step::Import,
            Stage::Analyze { .. } => Step::Analyze,
            Stage::Beautify { .. } => Step::Beautify,
            Stage::Result { .. } => Step::Result,
        }
    }

    pub fn source(&self) -> Option<&SourceImage> {
        match self {
            Stage::Setup | Stage::Import => None,
            Stage::Analyze { source, .. }
            | Stage::Beautify { source, .. }
            | Stage::Result { source, .. } => Some(source),
        }
    }

    pub fn note(&self) -> Option<&StructuredNote> {
        match self {
            Stage::Setup | Stage::Import => None,
            Stage::Analyze { note, .. } => note.as_ref(),
            Stage::Beautify { note, .. } | Stage::Result { note, .. } => Some(note),
        }
    }

    pub fn generated(&self) -> Option<&GeneratedImage> {
        match self {
            Stage::Result { image, .. } => Some(image),
            _ => None,
        }
    }
}
