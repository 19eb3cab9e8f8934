use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static UNSAFE_FILE_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\p{Cc}]"#).unwrap());

/// The five screens of the wizard. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Setup,
    Import,
    Analyze,
    Beautify,
    Result,
}

impl Step {
    /// Steps shown in the progress indicator, in order.
    pub const PROGRESS: [Step; 4] = [Step::Import, Step::Analyze, Step::Beautify, Step::Result];

    /// Position in the progress indicator. `Setup` is not part of it.
    pub fn progress_index(self) -> Option<usize> {
        Self::PROGRESS.iter().position(|s| *s == self)
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Setup => "Setup",
            Step::Import => "Import",
            Step::Analyze => "Analyze",
            Step::Beautify => "Beautify",
            Step::Result => "Finish",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Setup => "setup",
            Step::Import => "import",
            Step::Analyze => "analyze",
            Step::Beautify => "beautify",
            Step::Result => "result",
        };
        f.write_str(s)
    }
}

/// Returned when a settings string is not one of the accepted literals.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownValueError {
    pub kind: &'static str,
    pub value: String,
}

/// Output aspect ratios offered to the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "2:3")]
    Portrait2x3,
    #[serde(rename = "3:2")]
    Landscape3x2,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[default]
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Landscape16x9,
    #[serde(rename = "21:9")]
    Ultrawide21x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 8] = [
        AspectRatio::Square,
        AspectRatio::Portrait2x3,
        AspectRatio::Landscape3x2,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Portrait9x16,
        AspectRatio::Landscape16x9,
        AspectRatio::Ultrawide21x9,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait2x3 => "2:3",
            AspectRatio::Landscape3x2 => "3:2",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Ultrawide21x9 => "21:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = UnknownValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| UnknownValueError {
                kind: "aspect ratio",
                value: s.to_string(),
            })
    }
}

/// Output resolution tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    pub const ALL: [ImageSize; 3] = [ImageSize::OneK, ImageSize::TwoK, ImageSize::FourK];

    pub fn as_str(self) -> &'static str {
        match self {
            ImageSize::OneK => "1K",
            ImageSize::TwoK => "2K",
            ImageSize::FourK => "4K",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = UnknownValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        ImageSize::ALL
            .into_iter()
            .find(|size| size.as_str() == wanted)
            .ok_or_else(|| UnknownValueError {
                kind: "image size",
                value: s.to_string(),
            })
    }
}

/// User-chosen options for the generation call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    pub aspect_ratio: AspectRatio,
    pub image_size: ImageSize,
}

impl GenerationSettings {
    /// Merge a partial update; absent fields keep their current value.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(ratio) = patch.aspect_ratio {
            self.aspect_ratio = ratio;
        }
        if let Some(size) = patch.image_size {
            self.image_size = size;
        }
    }
}

/// Partial settings update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
}

/// Transcription and analysis of a handwritten note.
///
/// Every field is required when deserializing: a response missing any of
/// them is rejected rather than turned into a partial note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StructuredNote {
    pub title: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub visual_themes: Vec<String>,
    pub raw_text: String,
}

impl StructuredNote {
    /// File name offered when saving the generated image: the title with each
    /// run of whitespace replaced by `_`, suffixed `_beautified.png`.
    ///
    /// Path separators, quotes, control characters and other characters a
    /// file system or `Content-Disposition` header cannot carry also become
    /// `_`, and leading dots are dropped, so the result is always a single
    /// plain path component.
    pub fn download_file_name(&self) -> String {
        let stem = WHITESPACE_RUN.replace_all(&self.title, "_");
        let stem = UNSAFE_FILE_CHAR.replace_all(&stem, "_");
        format!("{}_beautified.png", stem.trim_start_matches('.'))
    }
}
