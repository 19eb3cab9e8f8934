pub mod credential;
pub mod error;
pub mod image;
pub mod traits;
pub mod types;

pub use credential::ApiKeySlot;
pub use error::SketchError;
pub use image::{detect_mime_type, DataUri, GeneratedImage, SourceImage};
pub use traits::{CredentialProvider, NoteModel};
pub use types::{
    AspectRatio, GenerationSettings, ImageSize, SettingsPatch, Step, StructuredNote,
    UnknownValueError,
};
