use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use shared::client::{Profile, ProfileResponse};
use shared::{ApiResponse, Frame, SessionIdentity};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::state::{AppState, SocketCommand};

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<Profile>::error(message)),
    )
        .into_response()
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /profile: profile of the bearer token's owner
async fn profile(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(token) = bearer(&headers) else {
        return unauthorized("Missing or invalid Authorization header");
    };

    match state.profile_for(token) {
        Some(profile) => {
            let response: ProfileResponse = ApiResponse::ok(profile).with_message("Profile fetched");
            Json(response).into_response()
        }
        None => unauthorized("Invalid token"),
    }
}

/// GET /socket: upgrade to the realtime channel.
///
/// A bearer token is optional; a wrong one is rejected before the upgrade.
async fn socket(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if let Some(token) = bearer(&headers)
        && state.profile_for(token).is_none()
    {
        return unauthorized("Invalid token");
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    let id = state.register(cmd_tx);
    tracing::info!(socket = %id, "Realtime socket connected");

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => handle_frame(&state, id, text.as_str()),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(socket = %id, "Realtime socket disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(socket = %id, "Realtime socket error: {e}");
                        break;
                    }
                    _ => {} // Binary, Pong: ignore
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SocketCommand::Push(frame)) => {
                        let sent = match frame.to_text() {
                            Ok(text) => ws_sink.send(Message::Text(text.into())).await.is_ok(),
                            Err(e) => {
                                tracing::error!(socket = %id, "Failed to encode frame: {e}");
                                true
                            }
                        };
                        if !sent {
                            break;
                        }
                    }
                    Some(SocketCommand::Kick) | None => {
                        tracing::info!(socket = %id, "Kicking realtime socket");
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    state.unregister(id);
}

fn handle_frame(state: &AppState, id: Uuid, text: &str) {
    let frame = match Frame::from_text(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(socket = %id, "Malformed frame: {e}");
            return;
        }
    };

    if frame.is_identify() {
        match frame.parse_data::<SessionIdentity>() {
            Ok(identity) if identity.has_user_id() => {
                tracing::info!(socket = %id, %identity, "Socket identified");
                state.record_identify(id, identity);
            }
            Ok(_) => tracing::warn!(socket = %id, "identify without a user id"),
            Err(e) => tracing::warn!(socket = %id, "Bad identify payload: {e}"),
        }
    } else {
        tracing::debug!(socket = %id, event = %frame.event, "Client event");
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/profile", get(profile))
        .route("/socket", get(socket))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
