//! HTTP surface for the noteflow enrichment service.
//!
//! Submission endpoints hand work to the orchestrator and return a task id;
//! query endpoints read registry snapshots; the stream endpoint bridges the
//! per-task event bus onto Server-Sent Events.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post},
    Json, Router,
};
use base64::Engine;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestId, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use noteflow_core::{defaults, Error, NoteInput, TaskEvent, TaskSnapshot, TaskStatus};
use noteflow_pipeline::Orchestrator;

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so request ids sort chronologically;
/// useful for log correlation across submission, worker, and stream reads.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/notes/image", post(submit_image_note))
        .route("/api/v1/notes/text", post(submit_text_note))
        .route("/api/v1/notes/steps", get(processing_steps))
        .route("/api/v1/summaries", post(submit_multi_summary))
        .route("/api/v1/tasks", get(list_tasks))
        .route("/api/v1/tasks/:id", get(get_task))
        .route("/api/v1/tasks/:id", delete(cancel_task))
        .route("/api/v1/tasks/:id/result", get(get_task_result))
        .route("/api/v1/tasks/:id/stream", get(stream_task))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Wrapper mapping core errors onto HTTP responses.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::CapacityExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Owner identity from the `X-Owner-Id` header. Authentication itself is
/// handled upstream; an absent header maps to the nil owner.
fn owner_from_headers(headers: &HeaderMap) -> ApiResult<Uuid> {
    match headers.get("x-owner-id") {
        None => Ok(Uuid::nil()),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| ApiError(Error::InvalidInput("invalid X-Owner-Id header".to_string()))),
    }
}

// =============================================================================
// REQUEST / RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ImageNoteRequest {
    /// Base64-encoded image payload (PNG, JPEG, GIF, or WebP).
    pub image_base64: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TextNoteRequest {
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MultiSummaryRequest {
    pub notes: Vec<NoteInput>,
    #[serde(default)]
    pub min_notes_threshold: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TaskCreatedResponse {
    pub task_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    #[serde(default)]
    pub owner: Option<Uuid>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub limit: Option<usize>,
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "tasks_tracked": state.orchestrator.registry().len(),
        "available_slots": state.orchestrator.available_slots(),
    }))
}

async fn submit_image_note(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ImageNoteRequest>,
) -> ApiResult<(StatusCode, Json<TaskCreatedResponse>)> {
    let owner = owner_from_headers(&headers)?;
    let image = base64::engine::general_purpose::STANDARD
        .decode(request.image_base64.as_bytes())
        .map_err(|_| Error::InvalidInput("image_base64 is not valid base64".to_string()))?;
    let task_id =
        state
            .orchestrator
            .submit_smart_note_image(owner, image, request.title.as_deref())?;
    Ok((StatusCode::ACCEPTED, Json(TaskCreatedResponse { task_id })))
}

async fn submit_text_note(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TextNoteRequest>,
) -> ApiResult<(StatusCode, Json<TaskCreatedResponse>)> {
    let owner = owner_from_headers(&headers)?;
    let task_id = state.orchestrator.submit_smart_note_text(
        owner,
        &request.text,
        request.title.as_deref(),
    )?;
    Ok((StatusCode::ACCEPTED, Json(TaskCreatedResponse { task_id })))
}

async fn submit_multi_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MultiSummaryRequest>,
) -> ApiResult<(StatusCode, Json<TaskCreatedResponse>)> {
    let owner = owner_from_headers(&headers)?;
    let task_id = state.orchestrator.submit_multi_summary(
        owner,
        request.notes,
        request.min_notes_threshold,
    )?;
    Ok((StatusCode::ACCEPTED, Json(TaskCreatedResponse { task_id })))
}

/// Static description of the smart-note stages, for client progress UIs.
async fn processing_steps() -> Json<serde_json::Value> {
    Json(json!({
        "steps": [
            {"step": "ocr_recognition", "description": "Extract text from the uploaded image"},
            {"step": "error_correction", "description": "Correct recognition errors"},
            {"step": "note_summary", "description": "Generate the structured study summary"},
            {"step": "save_to_database", "description": "Persist the results and generate tags"},
        ]
    }))
}

async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Vec<TaskSnapshot>>> {
    let owner = match query.owner {
        Some(owner) => owner,
        None => owner_from_headers(&headers)?,
    };
    let limit = query.limit.unwrap_or(20).min(100);
    Ok(Json(
        state.orchestrator.registry().list(owner, query.status, limit),
    ))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskSnapshot>> {
    state
        .orchestrator
        .registry()
        .get(id)
        .map(Json)
        .ok_or_else(|| ApiError(Error::NotFound(format!("task {}", id))))
}

async fn get_task_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let snapshot = state
        .orchestrator
        .registry()
        .get(id)
        .ok_or_else(|| ApiError(Error::NotFound(format!("task {}", id))))?;

    if !snapshot.status.is_terminal() {
        return Err(ApiError(Error::Conflict(format!(
            "task {} is still {}",
            id, snapshot.status
        ))));
    }

    Ok(Json(json!({
        "task_id": snapshot.id,
        "status": snapshot.status,
        "result": snapshot.result,
        "error": snapshot.error,
    })))
}

async fn cancel_task(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    state.orchestrator.registry().cancel(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// SSE stream of a task's progress events.
///
/// The subscription's synthesized burst comes first, then live events; the
/// stream ends after the terminal event. Client disconnects simply drop the
/// subscription without affecting the pipeline.
async fn stream_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = std::result::Result<Event, std::convert::Infallible>>>> {
    let bus = state
        .orchestrator
        .registry()
        .bus(id)
        .ok_or_else(|| ApiError(Error::NotFound(format!("task {}", id))))?;

    let (burst, live) = bus.subscribe();

    use futures::stream::{self, StreamExt};
    let live_stream: futures::stream::BoxStream<'static, TaskEvent> = match live {
        Some(rx) => tokio_stream::wrappers::BroadcastStream::new(rx)
            .filter_map(|result| futures::future::ready(result.ok()))
            .boxed(),
        None => stream::empty().boxed(),
    };

    // End the stream one event boundary after the terminal event.
    let events = stream::iter(burst)
        .chain(live_stream)
        .scan(false, |done, event: TaskEvent| {
            let emit = if *done {
                None
            } else {
                if event.is_terminal() {
                    *done = true;
                }
                Some(event)
            };
            futures::future::ready(emit)
        })
        .map(|event| {
            let payload = serde_json::to_string(&event).unwrap_or_default();
            Ok(Event::default().event(event.event_type()).data(payload))
        });

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(defaults::SSE_KEEPALIVE_SECS))
            .text("keepalive"),
    ))
}
