//! The relay's transport layer: WebSocket termination for clients and the
//! HTTP command surface for the backend.
//!
//! Three routes:
//! - `GET /ws` upgrades to a WebSocket; each connection gets a dedicated
//!   task that pumps the core's outbound frames onto the socket and feeds
//!   pong/close events back into the lifecycle handler.
//! - `POST /emit` takes `{wsClientId, payload}` and maps the dispatcher's
//!   outcome onto HTTP status codes.
//! - `GET /health` reports connection count and uptime.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use futures_util::StreamExt;
use lib_relay::core::{EmitOutcome, OutboundFrame};
use serde_json::json;
use tokio::sync::{broadcast, mpsc};

use crate::relay_logic::guard;
use crate::relay_logic::model::EmitRequest;
use crate::relay_logic::state::AppState;

pub async fn run(state: AppState, mut shutdown: broadcast::Receiver<()>) -> anyhow::Result<()> {
    let settings = Arc::clone(&state.settings);

    // The WebSocket endpoint stays open to everyone; the HTTP command
    // surface goes through the admission guard.
    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/emit", post(emit_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_authorized,
        ));

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .merge(api)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    log::info!("Relay gateway listening on {}", addr);

    if let Some((cert_path, key_path)) = settings.tls.as_ref() {
        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.recv().await.ok();
            log::info!("Relay gateway shutting down.");
            shutdown_handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        });
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.recv().await.ok();
            log::info!("Relay gateway shutting down.");
        })
        .await?;
    }

    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "connections": state.registry.size(),
        "uptime": state.uptime_secs(),
    }))
}

async fn emit_handler(
    State(state): State<AppState>,
    Json(request): Json<EmitRequest>,
) -> impl IntoResponse {
    let target = request.ws_client_id.as_deref().unwrap_or("");
    match state.dispatcher.emit(target, request.payload.as_ref()) {
        EmitOutcome::Delivered => (StatusCode::OK, Json(json!({"success": true}))),
        EmitOutcome::BadRequest => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing required parameters"})),
        ),
        EmitOutcome::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Client not found"})),
        ),
        EmitOutcome::DeliveryFailed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Failed to send message"})),
        ),
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Pumps one client session: outbound frames from the core onto the socket,
/// pong and close events from the socket into the lifecycle handler.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let client_id = state.lifecycle.on_connect(tx);

    loop {
        tokio::select! {
            inbound = socket.next() => {
                match inbound {
                    Some(Ok(Message::Pong(_))) => state.lifecycle.on_probe_response(&client_id),
                    Some(Ok(Message::Close(_))) | None => break,
                    // The relay carries no client-to-server data; anything
                    // else a client sends is ignored.
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            frame = rx.recv() => {
                match frame {
                    Some(OutboundFrame::Data(payload)) => {
                        if socket.send(Message::Text(payload.as_str().into())).await.is_err() {
                            break;
                        }
                    }
                    Some(OutboundFrame::Probe) => {
                        if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
                            break;
                        }
                    }
                    Some(OutboundFrame::Terminate) | None => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    state.lifecycle.on_disconnect(&client_id);
}
