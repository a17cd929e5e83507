//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - session API under `/api/v1/sessions/...`
/// - landing bundle from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/sessions", post(http::http_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(http::http_get_session).delete(http::http_delete_session),
        )
        .route("/api/v1/sessions/:id/contact", post(http::http_post_contact))
        .route("/api/v1/sessions/:id/open", post(http::http_post_open))
        .route("/api/v1/sessions/:id/instruction", post(http::http_post_instruction))
        .route("/api/v1/sessions/:id/answer", post(http::http_post_answer))
        .route("/api/v1/sessions/:id/again", post(http::http_post_again))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::backend::BackendClient;
    use crate::config::{AppConfig, BackendCfg};
    use crate::telemetry::TelemetrySink;

    fn app() -> Router {
        let backend = BackendClient::new(&BackendCfg::default()).unwrap();
        let telemetry = Arc::new(TelemetrySink::default());
        let state = AppState::with_parts(AppConfig::defaults(), Arc::new(backend), telemetry.clone(), telemetry);
        build_router(Arc::new(state))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_counters() {
        let app = app();
        let (status, body) = send(&app, Request::get("/api/v1/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["sessions"], 0);
        assert_eq!(body["submissions_failed"], 0);
    }

    #[tokio::test]
    async fn session_lifecycle_over_http() {
        let app = app();
        let (status, created) = send(
            &app,
            post_json(
                "/api/v1/sessions",
                serde_json::json!({"quiz": "team_mini", "page_url": "https://formula.example/?utm_source=ya"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["step"], "contact");
        let id = created["id"].as_str().unwrap().to_string();

        // answering before registration is a conflict
        let (status, body) = send(
            &app,
            post_json(&format!("/api/v1/sessions/{id}/answer"), serde_json::json!({"option_id": "a"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "wrong_step");

        // an empty form is rejected locally, before any network call
        let (status, body) =
            send(&app, post_json(&format!("/api/v1/sessions/{id}/contact"), serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation");
        assert_eq!(body["fields"]["consent"], "Подтвердите согласие на обработку данных.");

        let uri = format!("/api/v1/sessions/{id}");
        let (status, _) = send(&app, Request::delete(uri.as_str()).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send(&app, Request::get(uri.as_str()).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unknown_session");
    }

    #[tokio::test]
    async fn malformed_session_id_is_a_json_bad_request() {
        let app = app();
        let (status, body) =
            send(&app, Request::get("/api/v1/sessions/not-a-uuid").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert!(body["message"].as_str().unwrap().contains("not-a-uuid"));

        let (status, body) =
            send(&app, post_json("/api/v1/sessions/123/answer", serde_json::json!({"option_id": "a"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }
}
