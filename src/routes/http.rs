//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; flow errors become JSON error bodies with a matching status.

use std::sync::Arc;
use axum::{
  async_trait,
  extract::{FromRequestParts, Path, State},
  http::{request::Parts, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::flow::FlowError;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

impl IntoResponse for FlowError {
  fn into_response(self) -> Response {
    let status = match &self {
      FlowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
      FlowError::Registration(_) => StatusCode::BAD_GATEWAY,
      FlowError::WrongStep { .. } | FlowError::Busy => StatusCode::CONFLICT,
      FlowError::UnknownSession(_) => StatusCode::NOT_FOUND,
      FlowError::QuestionsUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(ErrorBody::from(&self))).into_response()
  }
}

type ViewResult = Result<Json<SessionView>, FlowError>;

/// `:id` path segment parsed as a session UUID; anything else is a JSON 400.
#[derive(Debug, Clone, Copy)]
pub struct SessionId(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for SessionId {
  type Rejection = Response;

  async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
    let Path(raw) = Path::<String>::from_request_parts(parts, state)
      .await
      .map_err(|e| bad_request(e.body_text()))?;
    Uuid::parse_str(&raw)
      .map(SessionId)
      .map_err(|e| bad_request(format!("Invalid session id {raw:?}: {e}")))
  }
}

fn bad_request(message: String) -> Response {
  (StatusCode::BAD_REQUEST, Json(ErrorBody { error: "bad_request", message, fields: None })).into_response()
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut {
    ok: true,
    sessions: state.session_count().await,
    submissions_delivered: state.telemetry.delivered(),
    submissions_failed: state.telemetry.failed(),
  })
}

#[instrument(level = "info", skip(state, body), fields(quiz = ?body.quiz))]
pub async fn http_create_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CreateSessionIn>,
) -> impl IntoResponse {
  let view = logic::create_session(&state, body).await;
  info!(target: "quiz_backend", id = %view.id, "HTTP session created");
  (StatusCode::CREATED, Json(view))
}

#[instrument(level = "debug", skip(state))]
pub async fn http_get_session(State(state): State<Arc<AppState>>, SessionId(id): SessionId) -> ViewResult {
  logic::view(&state, id).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  SessionId(id): SessionId,
) -> Result<StatusCode, FlowError> {
  logic::close_session(&state, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state, form))]
pub async fn http_post_contact(
  State(state): State<Arc<AppState>>,
  SessionId(id): SessionId,
  Json(form): Json<ContactForm>,
) -> ViewResult {
  logic::register_contact(&state, id, form).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_open(State(state): State<Arc<AppState>>, SessionId(id): SessionId) -> ViewResult {
  logic::open_quiz(&state, id).await.map(Json)
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_instruction(
  State(state): State<Arc<AppState>>,
  SessionId(id): SessionId,
  Json(body): Json<InstructionIn>,
) -> ViewResult {
  logic::start_assessment(&state, id, &body.employee_name).await.map(Json)
}

#[instrument(level = "info", skip(state, body), fields(question_id = ?body.question_id))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  SessionId(id): SessionId,
  Json(body): Json<AnswerIn>,
) -> ViewResult {
  logic::submit_answer(&state, id, body).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_again(State(state): State<Arc<AppState>>, SessionId(id): SessionId) -> ViewResult {
  logic::assess_another(&state, id).await.map(Json)
}
