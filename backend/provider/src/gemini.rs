use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use sketchnote_core::{
    ApiKeySlot, GeneratedImage, GenerationSettings, NoteModel, SketchError, SourceImage,
    StructuredNote,
};
use sketchnote_logging::redact_sensitive_data;

use crate::wire::{
    build_analysis_request, build_generation_request, extract_image, parse_analysis_response,
    ErrorEnvelope, GenerateContentRequest, GenerateContentResponse,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";

/// Gemini `generateContent` client for both wizard calls.
///
/// The key is read from the shared slot on every call, so re-selecting a key
/// takes effect without rebuilding the provider.
pub struct GeminiProvider {
    client: Client,
    key: ApiKeySlot,
    base_url: String,
    analysis_model: String,
    image_model: String,
}

impl GeminiProvider {
    pub fn new(key: ApiKeySlot) -> Self {
        Self {
            client: Client::new(),
            key,
            base_url: DEFAULT_BASE_URL.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_models(
        mut self,
        analysis_model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Self {
        self.analysis_model = analysis_model.into();
        self.image_model = image_model.into();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let api_key = self.key.get().await.ok_or(SketchError::MissingCredential)?;
        let start = Instant::now();

        debug!(model = %model, "Sending request to Gemini");

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .context("Gemini HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let (message, provider_status) = match serde_json::from_str::<ErrorEnvelope>(&raw) {
                Ok(envelope) => (envelope.error.message, envelope.error.status),
                Err(_) => (redact_sensitive_data(&raw), None),
            };
            warn!(
                model = %model,
                status = status.as_u16(),
                provider_status = provider_status.as_deref().unwrap_or("-"),
                message = %message,
                "Gemini returned an error"
            );
            return Err(SketchError::Provider {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        info!(
            model = %model,
            latency_ms = start.elapsed().as_millis() as u64,
            "Gemini responded"
        );
        Ok(parsed)
    }
}

#[async_trait]
impl NoteModel for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze(&self, image: &SourceImage) -> Result<StructuredNote> {
        info!(
            mime = %image.data_uri().mime_type(),
            bytes = image.byte_len(),
            "Analyzing note via Gemini"
        );
        let body = build_analysis_request(image);
        let response = self.generate_content(&self.analysis_model, &body).await?;
        Ok(parse_analysis_response(&response)?)
    }

    async fn generate(
        &self,
        note: &StructuredNote,
        settings: &GenerationSettings,
    ) -> Result<GeneratedImage> {
        info!(
            title = %note.title,
            aspect_ratio = %settings.aspect_ratio,
            image_size = %settings.image_size,
            "Generating sketchnote via Gemini"
        );
        let body = build_generation_request(note, settings);
        let response = self.generate_content(&self.image_model, &body).await?;
        Ok(extract_image(&response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::response::IntoResponse;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use sketchnote_core::{AspectRatio, ImageSize};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Seen {
        path: Option<String>,
        key: Option<String>,
        body: Option<Value>,
    }

    /// Serve `reply` for every request on a local port, recording the last one.
    async fn fake_gemini(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Seen>>) {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let recorder = Arc::clone(&seen);
        let app = Router::new().fallback(move |uri: Uri, headers: HeaderMap, Json(body): Json<Value>| {
            let recorder = Arc::clone(&recorder);
            let reply = reply.clone();
            async move {
                let mut seen = recorder.lock().await;
                seen.path = Some(uri.path().to_string());
                seen.key = headers
                    .get("x-goog-api-key")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                seen.body = Some(body);
                (status, Json(reply)).into_response()
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1beta"), seen)
    }

    fn note() -> StructuredNote {
        StructuredNote {
            title: "T".into(),
            summary: "S".into(),
            key_points: vec!["a".into(), "b".into()],
            visual_themes: vec!["x".into()],
            raw_text: "...".into(),
        }
    }

    #[tokio::test]
    async fn analyze_posts_to_analysis_model() {
        let note_json = serde_json::to_string(&note()).unwrap();
        let (base, seen) = fake_gemini(
            StatusCode::OK,
            json!({ "candidates": [{ "content": { "parts": [{ "text": note_json }] } }] }),
        )
        .await;

        let provider =
            GeminiProvider::new(ApiKeySlot::new(Some("test-key".into()))).with_base_url(base);
        let image = SourceImage::from_bytes(b"png", "image/png");
        let result = provider.analyze(&image).await.unwrap();
        assert_eq!(result, note());

        let seen = seen.lock().await;
        assert_eq!(
            seen.path.as_deref(),
            Some("/v1beta/models/gemini-3-pro-preview:generateContent")
        );
        assert_eq!(seen.key.as_deref(), Some("test-key"));
        let body = seen.body.as_ref().unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
    }

    #[tokio::test]
    async fn generate_returns_inline_image() {
        let (base, seen) = fake_gemini(
            StatusCode::OK,
            json!({ "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": "aGVsbG8=" } }
            ]}}]}),
        )
        .await;

        let provider = GeminiProvider::new(ApiKeySlot::new(Some("k".into()))).with_base_url(base);
        let settings = GenerationSettings {
            aspect_ratio: AspectRatio::Portrait2x3,
            image_size: ImageSize::TwoK,
        };
        let image = provider.generate(&note(), &settings).await.unwrap();
        assert_eq!(image.to_bytes().unwrap(), b"hello");

        let seen = seen.lock().await;
        let body = seen.body.as_ref().unwrap();
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "3:4");
        assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "2K");
        assert!(seen.path.as_deref().unwrap().contains("gemini-3-pro-image-preview"));
    }

    #[tokio::test]
    async fn provider_error_text_is_passed_through() {
        let (base, _seen) = fake_gemini(
            StatusCode::NOT_FOUND,
            json!({ "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND"
            }}),
        )
        .await;

        let provider = GeminiProvider::new(ApiKeySlot::new(Some("k".into()))).with_base_url(base);
        let err = provider
            .generate(&note(), &GenerationSettings::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Requested entity was not found"));
        assert!(matches!(
            err.downcast_ref::<SketchError>(),
            Some(SketchError::Provider { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let (base, seen) = fake_gemini(StatusCode::OK, json!({})).await;
        let provider = GeminiProvider::new(ApiKeySlot::default()).with_base_url(base);

        let err = provider
            .analyze(&SourceImage::from_bytes(b"x", "image/png"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SketchError>(),
            Some(SketchError::MissingCredential)
        ));
        assert!(seen.lock().await.path.is_none());
    }
}
