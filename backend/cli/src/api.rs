use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::MutexGuard;
use tracing::{error, info};
use uuid::Uuid;

use sketchnote_core::{SettingsPatch, Step};
use sketchnote_workflow::{ImportedFile, WorkflowController, WorkflowSnapshot};

use crate::session::{Session, SessionStore};

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared application state for API handlers.
pub struct AppState {
    pub sessions: SessionStore,
    pub offline: bool,
}

/// A session's state as returned by every session route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(flatten)]
    pub state: WorkflowSnapshot,
}

impl SessionView {
    fn new(session: &Session, state: WorkflowSnapshot) -> Self {
        Self {
            id: session.id,
            created_at: session.created_at,
            last_active: session.last_active(),
            state,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRequest {
    api_key: String,
}

/// Build the Axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/credential", post(select_credential))
        .route(
            "/api/sessions/{id}/import",
            post(import_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/sessions/{id}/analyze", post(run_analysis))
        .route("/api/sessions/{id}/settings", patch(update_settings))
        .route("/api/sessions/{id}/generate", post(run_generation))
        .route("/api/sessions/{id}/back", post(back_to_preview))
        .route("/api/sessions/{id}/cancel", post(cancel))
        .route("/api/sessions/{id}/reset", post(reset))
        .route("/api/sessions/{id}/source", get(source_image))
        .route("/api/sessions/{id}/download", get(download))
        .with_state(state)
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "sketchnote",
        "version": env!("CARGO_PKG_VERSION"),
        "offline": state.offline,
        "sessions": state.sessions.len().await,
    }))
}

async fn find(state: &AppState, id: &Uuid) -> Result<Arc<Session>, StatusCode> {
    let session = state.sessions.get(id).await.ok_or(StatusCode::NOT_FOUND)?;
    session.touch();
    Ok(session)
}

/// Controller access for an action; a second action while one is running is a conflict.
fn lock(session: &Session) -> Result<MutexGuard<'_, WorkflowController>, StatusCode> {
    session.try_controller().ok_or_else(|| {
        info!(session = %session.id, "Rejected action while a model call is in flight");
        StatusCode::CONFLICT
    })
}

async fn respond(
    session: &Session,
    controller: MutexGuard<'_, WorkflowController>,
) -> Json<SessionView> {
    let snapshot = controller.snapshot();
    session.publish(snapshot.clone()).await;
    drop(controller);
    Json(SessionView::new(session, snapshot))
}

/// Start a new wizard run.
async fn create_session(State(state): State<Arc<AppState>>) -> (StatusCode, Json<SessionView>) {
    let session = state.sessions.create().await;
    info!(session = %session.id, "Session created");
    let snapshot = session.snapshot().await;
    (StatusCode::CREATED, Json(SessionView::new(&session, snapshot)))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, StatusCode> {
    let session = find(&state, &id).await?;
    let snapshot = session.snapshot().await;
    Ok(Json(SessionView::new(&session, snapshot)))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    match state.sessions.remove(&id).await {
        Some(_) => {
            info!(session = %id, "Session deleted");
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

/// Store the user's key and leave the setup step. Only accepted in setup.
async fn select_credential(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<CredentialRequest>,
) -> Result<Json<SessionView>, StatusCode> {
    let session = find(&state, &id).await?;
    let mut controller = lock(&session)?;
    if controller.step() != Step::Setup {
        info!(session = %id, step = %controller.step(), "Rejected key outside the setup step");
        return Err(StatusCode::CONFLICT);
    }
    session.key().set(request.api_key).await;
    controller.select_credential().await;
    Ok(respond(&session, controller).await)
}

/// Raw image upload. An empty body means no file was chosen.
async fn import_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SessionView>, StatusCode> {
    let session = find(&state, &id).await?;
    let mut controller = lock(&session)?;
    let file = (!body.is_empty()).then(|| {
        let mime_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream");
        ImportedFile::new(body.to_vec(), mime_type)
    });
    controller.import_image(file);
    Ok(respond(&session, controller).await)
}

async fn run_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, StatusCode> {
    let session = find(&state, &id).await?;
    let mut controller = lock(&session)?;
    session.publish(controller.snapshot()).await;
    controller.run_analysis().await;
    Ok(respond(&session, controller).await)
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<SessionView>, StatusCode> {
    let session = find(&state, &id).await?;
    let mut controller = lock(&session)?;
    controller.update_settings(patch);
    Ok(respond(&session, controller).await)
}

async fn run_generation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, StatusCode> {
    let session = find(&state, &id).await?;
    let mut controller = lock(&session)?;
    session.publish(controller.snapshot()).await;
    controller.run_generation().await;
    Ok(respond(&session, controller).await)
}

async fn back_to_preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, StatusCode> {
    let session = find(&state, &id).await?;
    let mut controller = lock(&session)?;
    controller.back_to_preview();
    Ok(respond(&session, controller).await)
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, StatusCode> {
    let session = find(&state, &id).await?;
    let mut controller = lock(&session)?;
    controller.cancel();
    Ok(respond(&session, controller).await)
}

async fn reset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, StatusCode> {
    let session = find(&state, &id).await?;
    let mut controller = lock(&session)?;
    controller.reset();
    Ok(respond(&session, controller).await)
}

/// The imported photo, as uploaded.
async fn source_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, StatusCode> {
    let session = find(&state, &id).await?;
    let controller = lock(&session)?;
    let uri = controller
        .source_image()
        .map(|image| image.data_uri().clone())
        .ok_or(StatusCode::NOT_FOUND)?;
    drop(controller);

    let bytes = uri.decode().map_err(|e| {
        error!(session = %id, error = %e, "Stored source image is not valid base64");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(([(header::CONTENT_TYPE, uri.mime_type().to_string())], bytes).into_response())
}

/// The generated sketchnote as a file attachment.
async fn download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, StatusCode> {
    let session = find(&state, &id).await?;
    let controller = lock(&session)?;
    let (image, file_name) = match (controller.generated_image(), controller.download_file_name()) {
        (Some(image), Some(name)) => (image.clone(), name),
        _ => return Err(StatusCode::NOT_FOUND),
    };
    drop(controller);

    let bytes = image.to_bytes().map_err(|e| {
        error!(session = %id, error = %e, "Generated image is not valid base64");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    info!(session = %id, file = %file_name, bytes = bytes.len(), "Sketchnote downloaded");
    Ok((
        [
            (header::CONTENT_TYPE, image.data_uri().mime_type().to_string()),
            (header::CONTENT_DISPOSITION, attachment_disposition(&file_name)),
        ],
        bytes,
    )
        .into_response())
}

/// `Content-Disposition` for a download: an ASCII-only `filename` for old
/// clients plus the exact name as RFC 5987 `filename*`.
fn attachment_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use sketchnote_core::{ApiKeySlot, GenerationSettings, NoteModel, StructuredNote};
    use sketchnote_provider::MockModel;
    use sketchnote_workflow::{CREDENTIAL_FAILED_MESSAGE, GENERATION_FAILED_MESSAGE};
    use tower::ServiceExt;

    use crate::session::ModelFactory;

    fn note() -> StructuredNote {
        StructuredNote {
            title: "Quarterly Plan".into(),
            summary: "Ship the thing".into(),
            key_points: vec!["scope".into(), "dates".into()],
            visual_themes: vec!["rocket".into()],
            raw_text: "q3 plan".into(),
        }
    }

    fn router_with(model: MockModel, key: Option<&str>) -> Router {
        let model: Arc<dyn NoteModel> = Arc::new(model);
        let factory: ModelFactory = Arc::new(move |_slot| Arc::clone(&model));
        let state = AppState {
            sessions: SessionStore::new(
                factory,
                ApiKeySlot::new(key.map(str::to_string)),
                GenerationSettings::default(),
            ),
            offline: true,
        };
        build_router(Arc::new(state))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Body) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create(app: &Router) -> String {
        let (status, body) = send(app, Method::POST, "/api/sessions", Body::empty()).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    async fn upload(app: &Router, id: &str, bytes: &'static [u8]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/sessions/{id}/import"))
            .header(header::CONTENT_TYPE, "image/jpeg")
            .body(Body::from(bytes))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post(app: &Router, id: &str, action: &str) -> (StatusCode, Value) {
        send(app, Method::POST, &format!("/api/sessions/{id}/{action}"), Body::empty()).await
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = router_with(MockModel::new("mock"), Some("k"));
        let (status, body) = send(&app, Method::GET, "/api/health", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 0);
    }

    #[tokio::test]
    async fn full_run_ends_with_a_named_download() {
        let app = router_with(MockModel::new("mock").with_analysis(note()), Some("k"));
        let id = create(&app).await;

        let (_, body) = upload(&app, &id, b"jpeg-bytes").await;
        assert_eq!(body["step"], "analyze");
        assert_eq!(body["hasSourceImage"], true);

        let (_, body) = post(&app, &id, "analyze").await;
        assert_eq!(body["step"], "beautify");
        assert_eq!(body["note"]["title"], "Quarterly Plan");

        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/api/sessions/{id}/settings"),
            Body::from(r#"{"aspectRatio":"16:9","imageSize":"4K"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["settings"]["aspectRatio"], "16:9");
        assert_eq!(body["settings"]["imageSize"], "4K");

        let (_, body) = post(&app, &id, "generate").await;
        assert_eq!(body["step"], "result");
        assert_eq!(body["stepLabel"], "Finish");
        assert_eq!(body["downloadFileName"], "Quarterly_Plan_beautified.png");

        let request = Request::builder()
            .uri(format!("/api/sessions/{id}/download"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Quarterly_Plan_beautified.png\"; \
             filename*=UTF-8''Quarterly_Plan_beautified.png"
        );

        let request = Request::builder()
            .uri(format!("/api/sessions/{id}/source"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"jpeg-bytes");
    }

    #[tokio::test]
    async fn empty_upload_changes_nothing() {
        let app = router_with(MockModel::new("mock"), Some("k"));
        let id = create(&app).await;

        let (status, body) = upload(&app, &id, b"").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "import");
        assert_eq!(body["hasSourceImage"], false);
    }

    #[tokio::test]
    async fn missing_key_starts_at_setup_until_one_is_given() {
        let app = router_with(MockModel::new("mock"), None);
        let id = create(&app).await;
        let (_, body) = send(&app, Method::GET, &format!("/api/sessions/{id}"), Body::empty()).await;
        assert_eq!(body["step"], "setup");
        assert_eq!(body["progressIndex"], Value::Null);

        let (_, body) = send(
            &app,
            Method::POST,
            &format!("/api/sessions/{id}/credential"),
            Body::from(r#"{"apiKey":"AIza-test"}"#),
        )
        .await;
        assert_eq!(body["step"], "import");
        assert_eq!(body["progressIndex"], 0);
    }

    #[tokio::test]
    async fn rejected_key_sends_the_user_back_to_setup() {
        let model = MockModel::new("mock")
            .with_analysis(note())
            .with_generation_error("Requested entity was not found.");
        let app = router_with(model, Some("stale"));
        let id = create(&app).await;
        upload(&app, &id, b"jpeg").await;
        post(&app, &id, "analyze").await;

        let (_, body) = post(&app, &id, "generate").await;
        assert_eq!(body["step"], "setup");
        assert_eq!(body["error"], CREDENTIAL_FAILED_MESSAGE);
        assert_eq!(body["note"], Value::Null);
    }

    #[tokio::test]
    async fn other_generation_failures_stay_on_beautify() {
        let model = MockModel::new("mock")
            .with_analysis(note())
            .with_generation_error("quota exceeded");
        let app = router_with(model, Some("k"));
        let id = create(&app).await;
        upload(&app, &id, b"jpeg").await;
        post(&app, &id, "analyze").await;

        let (_, body) = post(&app, &id, "generate").await;
        assert_eq!(body["step"], "beautify");
        assert_eq!(body["error"], GENERATION_FAILED_MESSAGE);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/sessions/{id}/download"),
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn second_action_during_a_call_conflicts() {
        let model = MockModel::new("mock")
            .with_analysis(note())
            .with_delay(Duration::from_millis(300));
        let app = router_with(model, Some("k"));
        let id = create(&app).await;
        upload(&app, &id, b"jpeg").await;

        let background = app.clone();
        let path = id.clone();
        let call = tokio::spawn(async move { post(&background, &path, "analyze").await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let (_, body) = send(&app, Method::GET, &format!("/api/sessions/{id}"), Body::empty()).await;
        assert_eq!(body["loading"], true);
        assert_eq!(body["step"], "analyze");

        let (status, _) = post(&app, &id, "analyze").await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "beautify");
        assert_eq!(body["loading"], false);
    }

    #[tokio::test]
    async fn back_cancel_and_reset() {
        let app = router_with(
            MockModel::new("mock").with_analysis(note()),
            Some("k"),
        );
        let id = create(&app).await;
        upload(&app, &id, b"jpeg").await;
        post(&app, &id, "analyze").await;

        let (_, body) = post(&app, &id, "back").await;
        assert_eq!(body["step"], "analyze");
        assert_eq!(body["note"]["title"], "Quarterly Plan");

        let (_, body) = post(&app, &id, "cancel").await;
        assert_eq!(body["step"], "import");
        assert_eq!(body["hasSourceImage"], false);

        let (_, body) = post(&app, &id, "reset").await;
        assert_eq!(body["step"], "import");
    }

    #[tokio::test]
    async fn unknown_and_deleted_sessions_are_not_found() {
        let app = router_with(MockModel::new("mock"), Some("k"));
        let missing = Uuid::new_v4();
        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/sessions/{missing}"),
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let id = create(&app).await;
        let (status, _) =
            send(&app, Method::DELETE, &format!("/api/sessions/{id}"), Body::empty()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::GET, &format!("/api/sessions/{id}"), Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    /// Run a session to the result step with `title` and fetch the download.
    async fn download_for_title(title: &str) -> (StatusCode, Option<String>) {
        let model = MockModel::new("mock").with_analysis(StructuredNote {
            title: title.into(),
            ..note()
        });
        let app = router_with(model, Some("k"));
        let id = create(&app).await;
        upload(&app, &id, b"jpeg").await;
        post(&app, &id, "analyze").await;
        post(&app, &id, "generate").await;

        let request = Request::builder()
            .uri(format!("/api/sessions/{id}/download"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .map(|v| v.to_str().unwrap().to_string());
        (response.status(), disposition)
    }

    #[tokio::test]
    async fn quotes_in_the_title_keep_the_header_well_formed() {
        let (status, disposition) = download_for_title("My \"Big\" Idea").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            disposition.as_deref(),
            Some("attachment; filename=\"My__Big__Idea_beautified.png\"; \
                  filename*=UTF-8''My__Big__Idea_beautified.png")
        );
    }

    #[tokio::test]
    async fn control_characters_in_the_title_still_download() {
        let (status, disposition) = download_for_title("Plan\u{1}A").await;
        assert_eq!(status, StatusCode::OK);
        assert!(disposition.unwrap().contains("filename=\"Plan_A_beautified.png\""));
    }

    #[test]
    fn non_ascii_names_use_the_extended_parameter() {
        assert_eq!(
            attachment_disposition("Café_beautified.png"),
            "attachment; filename=\"Caf__beautified.png\"; filename*=UTF-8''Caf%C3%A9_beautified.png"
        );
    }

    #[tokio::test]
    async fn key_is_only_accepted_during_setup() {
        let app = router_with(MockModel::new("mock"), Some("configured"));
        let id = create(&app).await;

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/sessions/{id}/credential"),
            Body::from(r#"{"apiKey":"AIza-other"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = send(&app, Method::GET, &format!("/api/sessions/{id}"), Body::empty()).await;
        assert_eq!(body["step"], "import");
    }
}
