//! Teremok · Formula quiz backend
//!
//! - Axum HTTP + WebSocket API driving the landing-page quiz flow
//! - Lead registration and result submission against the external bot backend
//! - Static landing bundle fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   API_BASE             : backend base URL, default "http://localhost:8000/api"
//!   BACKEND_TIMEOUT_SECS : backend request timeout, default 20
//!   QUIZ_CONFIG_PATH     : path to TOML config (backend + per-site tags and paths)
//!   SESSION_TTL_SECS     : idle session lifetime, default 7200 (0 disables eviction)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod validation;
mod scoring;
mod flow;
mod backend;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: session store, lead markers, backend client.
  let state = Arc::new(AppState::new()?);
  state.spawn_idle_sweeper();

  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quiz_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
