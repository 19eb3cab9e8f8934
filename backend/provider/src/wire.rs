//! Request and response bodies for the `generateContent` endpoint, plus the
//! pure shaping/validation steps around them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use sketchnote_core::{
    DataUri, GeneratedImage, GenerationSettings, ImageSize, SketchError, SourceImage,
    StructuredNote,
};

use crate::aspect::ProviderAspectRatio;
use crate::prompts::{generation_prompt, ANALYSIS_INSTRUCTION};

/// MIME type assumed for returned image parts that do not declare one.
const DEFAULT_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: ProviderAspectRatio,
    pub image_size: ImageSize,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// All text parts of the first candidate, concatenated.
    pub fn text(&self) -> String {
        self.first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }
}

/// `{"error": {...}}` body returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub message: String,
    /// Canonical status name, e.g. `NOT_FOUND`.
    #[serde(default)]
    pub status: Option<String>,
}

/// Output schema the analysis call must satisfy.
pub fn note_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "summary": { "type": "STRING" },
            "keyPoints": { "type": "ARRAY", "items": { "type": "STRING" } },
            "visualThemes": { "type": "ARRAY", "items": { "type": "STRING" } },
            "rawText": { "type": "STRING" }
        },
        "required": ["title", "summary", "keyPoints", "visualThemes", "rawText"]
    })
}

pub fn build_analysis_request(image: &SourceImage) -> GenerateContentRequest {
    let uri = image.data_uri();
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".into()),
            parts: vec![
                Part {
                    inline_data: Some(InlineData {
                        mime_type: uri.mime_type().to_string(),
                        data: uri.base64_data().to_string(),
                    }),
                    ..Default::default()
                },
                Part::text(ANALYSIS_INSTRUCTION),
            ],
        }],
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".into()),
            response_schema: Some(note_schema()),
            ..Default::default()
        }),
    }
}

pub fn build_generation_request(
    note: &StructuredNote,
    settings: &GenerationSettings,
) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".into()),
            parts: vec![Part::text(generation_prompt(note))],
        }],
        generation_config: Some(GenerationConfig {
            image_config: Some(ImageConfig {
                aspect_ratio: settings.aspect_ratio.into(),
                image_size: settings.image_size,
            }),
            ..Default::default()
        }),
    }
}

/// Validate the analysis response against the note schema.
pub fn parse_analysis_response(
    response: &GenerateContentResponse,
) -> Result<StructuredNote, SketchError> {
    let text = response.text();
    if text.trim().is_empty() {
        return Err(SketchError::EmptyResponse);
    }
    serde_json::from_str(text.trim()).map_err(|e| SketchError::InvalidResponse(e.to_string()))
}

/// Take the first part carrying image data.
pub fn extract_image(response: &GenerateContentResponse) -> Result<GeneratedImage, SketchError> {
    response
        .first_parts()
        .iter()
        .find_map(|p| p.inline_data.as_ref())
        .map(|data| {
            let mime = if data.mime_type.is_empty() {
                DEFAULT_IMAGE_MIME
            } else {
                data.mime_type.as_str()
            };
            GeneratedImage::from(DataUri::from_base64(data.data.clone(), mime))
        })
        .ok_or(SketchError::NoImageProduced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketchnote_core::AspectRatio;

    fn note() -> StructuredNote {
        StructuredNote {
            title: "T".into(),
            summary: "S".into(),
            key_points: vec!["a".into(), "b".into()],
            visual_themes: vec!["x".into()],
            raw_text: "...".into(),
        }
    }

    fn response(value: Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn analysis_request_carries_image_instruction_and_schema() {
        let image = SourceImage::from_bytes(b"jpeg-bytes", "image/jpeg");
        let body = serde_json::to_value(build_analysis_request(&image)).unwrap();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(
            parts[0]["inlineData"]["data"],
            image.data_uri().base64_data()
        );
        assert!(parts[1]["text"].as_str().unwrap().contains("hand-drawn note"));

        let config = &body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["required"].as_array().unwrap().len(), 5);
        assert!(config.get("imageConfig").is_none());
    }

    #[test]
    fn generation_request_maps_ratio_and_keeps_size() {
        let settings = GenerationSettings {
            aspect_ratio: AspectRatio::Ultrawide21x9,
            image_size: ImageSize::FourK,
        };
        let body = serde_json::to_value(build_generation_request(&note(), &settings)).unwrap();

        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "4K");
        assert!(body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Key Points: a, b"));
    }

    #[test]
    fn parses_note_from_text_parts() {
        let resp = response(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "{\"title\":\"T\",\"summary\":\"S\"," },
                { "text": "\"keyPoints\":[\"a\",\"b\"],\"visualThemes\":[\"x\"],\"rawText\":\"...\"}" }
            ]}}]
        }));
        assert_eq!(parse_analysis_response(&resp).unwrap(), note());
    }

    #[test]
    fn empty_analysis_is_rejected() {
        let err = parse_analysis_response(&response(json!({ "candidates": [] }))).unwrap_err();
        assert!(matches!(err, SketchError::EmptyResponse));
    }

    #[test]
    fn analysis_missing_field_is_rejected() {
        let resp = response(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "{\"title\":\"T\",\"summary\":\"S\",\"keyPoints\":[],\"visualThemes\":[]}" }
            ]}}]
        }));
        let err = parse_analysis_response(&resp).unwrap_err();
        assert!(matches!(err, SketchError::InvalidResponse(ref m) if m.contains("rawText")));
    }

    #[test]
    fn extracts_first_inline_image() {
        let resp = response(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here is your sketchnote" },
                { "inlineData": { "mimeType": "image/png", "data": "aGVsbG8=" } },
                { "inlineData": { "mimeType": "image/jpeg", "data": "d29ybGQ=" } }
            ]}}]
        }));
        let image = extract_image(&resp).unwrap();
        assert_eq!(image.data_uri().to_string(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn text_only_generation_is_no_image() {
        let resp = response(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I cannot draw that" }] } }]
        }));
        assert!(matches!(extract_image(&resp), Err(SketchError::NoImageProduced)));
    }

    #[test]
    fn error_envelope_carries_status_name() {
        let envelope: ErrorEnvelope = serde_json::from_value(json!({
            "error": { "code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND" }
        }))
        .unwrap();
        assert_eq!(envelope.error.message, "Requested entity was not found.");
        assert_eq!(envelope.error.status.as_deref(), Some("NOT_FOUND"));

        let bare: ErrorEnvelope =
            serde_json::from_value(json!({ "error": { "message": "quota" } })).unwrap();
        assert!(bare.error.status.is_none());
    }
}
