//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::logic;
use crate::protocol::{ClientWsMessage, ErrorBody, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "quiz_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "quiz_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "quiz_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error {
            error: ErrorBody { error: "bad_request", message: format!("Invalid JSON: {}", e), fields: None },
          },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "error": "internal", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "quiz_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "quiz_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(msg, state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  let result = match msg {
    ClientWsMessage::Ping => return ServerWsMessage::Pong,

    ClientWsMessage::CreateSession { input } => Ok(logic::create_session(state, input).await),

    ClientWsMessage::View { session_id } => logic::view(state, session_id).await,

    ClientWsMessage::Contact { session_id, form } => logic::register_contact(state, session_id, form).await,

    ClientWsMessage::Open { session_id } => logic::open_quiz(state, session_id).await,

    ClientWsMessage::Instruction { session_id, employee_name } => {
      logic::start_assessment(state, session_id, &employee_name).await
    }

    ClientWsMessage::Answer { session_id, answer } => logic::submit_answer(state, session_id, answer).await,

    ClientWsMessage::Again { session_id } => logic::assess_another(state, session_id).await,

    ClientWsMessage::Close { session_id } => {
      return match logic::close_session(state, session_id).await {
        Ok(()) => ServerWsMessage::Closed { session_id },
        Err(e) => ServerWsMessage::Error { error: ErrorBody::from(&e) },
      };
    }
  };

  match result {
    Ok(session) => ServerWsMessage::Session { session },
    Err(e) => {
      debug!(target: "quiz_backend", error = %e, "WS event rejected");
      ServerWsMessage::Error { error: ErrorBody::from(&e) }
    }
  }
}
