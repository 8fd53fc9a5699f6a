// src/api/ws.rs
//! WebSocket endpoint for live notification delivery.
//!
//! Clients connect with `GET /ws?token=<JWT>`; the token is validated before
//! the upgrade, so an unauthenticated socket never registers. After the
//! upgrade the server forwards every payload queued for the user and answers
//! pings; clients are not expected to send anything else.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;

use crate::api::auth::Claims;
use crate::app_state::AppState;
use crate::config::Config;
use crate::utils::api_response::ApiResponse;

#[derive(Deserialize)]
pub struct WsAuth {
    pub token: String,
}

pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(auth): Query<WsAuth>,
    ws: WebSocketUpgrade,
) -> Response {
    let claims = match decode::<Claims>(
        &auth.token,
        &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data.claims,
        Err(e) => {
            tracing::warn!("WebSocket auth failed: {e}");
            return ApiResponse::<()>::error(
                StatusCode::UNAUTHORIZED,
                "Authentication error",
                None,
            )
            .into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, claims))
}

async fn handle_socket(socket: WebSocket, state: AppState, claims: Claims) {
    let (conn_id, mut rx) = state.registry.connect(claims.sub).await;
    tracing::info!(user_id = claims.sub, conn_id, "WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            payload = rx.recv() => {
                match payload {
                    Some(payload) => {
                        if sender
                            .send(Message::Text(payload.to_string().into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    // Registry dropped our channel: a newer connection replaced us.
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    // Browser clients send a bare "ping" text frame.
                    Some(Ok(Message::Text(text))) if text.as_str() == "ping" => {
                        if sender.send(Message::Text("pong".into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.registry.disconnect(claims.sub, conn_id).await;
    tracing::info!(user_id = claims.sub, conn_id, "WebSocket client disconnected");
}
