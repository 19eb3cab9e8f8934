use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use sketchnote_core::{
    DataUri, GeneratedImage, GenerationSettings, NoteModel, SourceImage, StructuredNote,
};

use crate::aspect::ProviderAspectRatio;

/// 1x1 PNG returned when no generation outcome has been scripted.
const PLACEHOLDER_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mP8/x8AAwMCAO+ip1sAAAAASUVORK5CYII=";

/// What a generation call was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateCall {
    pub title: String,
    pub settings: GenerationSettings,
    pub provider_ratio: ProviderAspectRatio,
}

/// An in-memory model with scripted outcomes, for tests and offline runs.
///
/// Scripted results are consumed in order; once a queue is empty the model
/// answers with a canned note or a placeholder image.
pub struct MockModel {
    name: String,
    analyses: Mutex<VecDeque<Result<StructuredNote, String>>>,
    generations: Mutex<VecDeque<Result<GeneratedImage, String>>>,
    calls: Mutex<Vec<GenerateCall>>,
    delay: Option<Duration>,
}

impl MockModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            analyses: Mutex::new(VecDeque::new()),
            generations: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_analysis(mut self, note: StructuredNote) -> Self {
        self.analyses.get_mut().push_back(Ok(note));
        self
    }

    pub fn with_analysis_error(mut self, message: impl Into<String>) -> Self {
        self.analyses.get_mut().push_back(Err(message.into()));
        self
    }

    pub fn with_image(mut self, image: GeneratedImage) -> Self {
        self.generations.get_mut().push_back(Ok(image));
        self
    }

    pub fn with_generation_error(mut self, message: impl Into<String>) -> Self {
        self.generations.get_mut().push_back(Err(message.into()));
        self
    }

    /// Hold every call open for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Generation calls received so far.
    pub async fn generate_calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().await.clone()
    }

    pub fn placeholder_image() -> GeneratedImage {
        GeneratedImage::from(DataUri::from_base64(PLACEHOLDER_PNG, "image/png"))
    }

    fn canned_note() -> StructuredNote {
        StructuredNote {
            title: "Offline Sketchnote".into(),
            summary: "Produced without contacting a model provider.".into(),
            key_points: vec!["Import".into(), "Analyze".into(), "Beautify".into()],
            visual_themes: vec!["pencil".into(), "lightbulb".into()],
            raw_text: String::new(),
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl NoteModel for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, _image: &SourceImage) -> Result<StructuredNote> {
        self.pause().await;
        match self.analyses.lock().await.pop_front() {
            Some(Ok(note)) => Ok(note),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(Self::canned_note()),
        }
    }

    async fn generate(
        &self,
        note: &StructuredNote,
        settings: &GenerationSettings,
    ) -> Result<GeneratedImage> {
        self.calls.lock().await.push(GenerateCall {
            title: note.title.clone(),
            settings: *settings,
            provider_ratio: settings.aspect_ratio.into(),
        });
        self.pause().await;
        match self.generations.lock().await.pop_front() {
            Some(Ok(image)) => Ok(image),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(Self::placeholder_image()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketchnote_core::{AspectRatio, ImageSize};

    #[tokio::test]
    async fn scripted_outcomes_are_consumed_in_order() {
        let model = MockModel::new("mock")
            .with_analysis_error("blurry")
            .with_generation_error("quota exceeded");
        let image = SourceImage::from_bytes(b"x", "image/png");

        assert_eq!(model.analyze(&image).await.unwrap_err().to_string(), "blurry");
        assert_eq!(model.analyze(&image).await.unwrap().title, "Offline Sketchnote");

        let note = MockModel::canned_note();
        let settings = GenerationSettings {
            aspect_ratio: AspectRatio::Landscape3x2,
            image_size: ImageSize::TwoK,
        };
        assert!(model.generate(&note, &settings).await.is_err());
        assert!(model.generate(&note, &settings).await.unwrap().to_bytes().is_ok());

        let calls = model.generate_calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].provider_ratio, ProviderAspectRatio::Landscape4x3);
    }
}
