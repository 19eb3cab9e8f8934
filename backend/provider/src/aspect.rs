use std::fmt;

use serde::{Deserialize, Serialize};

use sketchnote_core::AspectRatio;

/// Aspect ratios the image model accepts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProviderAspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Landscape16x9,
}

impl ProviderAspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderAspectRatio::Square => "1:1",
            ProviderAspectRatio::Portrait3x4 => "3:4",
            ProviderAspectRatio::Landscape4x3 => "4:3",
            ProviderAspectRatio::Portrait9x16 => "9:16",
            ProviderAspectRatio::Landscape16x9 => "16:9",
        }
    }
}

impl fmt::Display for ProviderAspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AspectRatio> for ProviderAspectRatio {
    fn from(ratio: AspectRatio) -> Self {
        match ratio {
            AspectRatio::Square => ProviderAspectRatio::Square,
            AspectRatio::Portrait3x4 | AspectRatio::Portrait2x3 => ProviderAspectRatio::Portrait3x4,
            AspectRatio::Landscape4x3 | AspectRatio::Landscape3x2 => {
                ProviderAspectRatio::Landscape4x3
            }
            AspectRatio::Portrait9x16 => ProviderAspectRatio::Portrait9x16,
            AspectRatio::Landscape16x9 | AspectRatio::Ultrawide21x9 => {
                ProviderAspectRatio::Landscape16x9
            }
        }
    }
}

/// Map a ratio string from the UI onto the provider's set.
/// Unrecognized input falls back to `1:1`.
pub fn map_aspect_ratio(ratio: &str) -> ProviderAspectRatio {
    ratio
        .parse::<AspectRatio>()
        .map(ProviderAspectRatio::from)
        .unwrap_or(ProviderAspectRatio::Square)
}
