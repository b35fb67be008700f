//! Dashboard HTTP API
//!
//! Read-only views of the latest snapshot plus the three operator commands.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::types::*;
use super::WebSocketBroadcaster;
use crate::driver::DriverHandle;
use crate::status::Command;
use crate::types::Timeframe;

type AppState = (DriverHandle, WebSocketBroadcaster);

/// Create the API router with all endpoints
pub fn create_router(handle: DriverHandle, broadcaster: WebSocketBroadcaster) -> Router {
    Router::new()
        // Read-only views
        .route("/api/state", get(get_state))
        .route("/api/orders", get(get_orders))
        .route("/api/signals", get(get_signals))
        // Operator commands
        .route("/api/trading/toggle", post(post_toggle))
        .route("/api/trading/emergency", post(post_emergency))
        .route("/api/timeframe", post(post_timeframe))
        // WebSocket
        .route("/ws", get(websocket_handler))
        // State
        .with_state((handle, broadcaster))
        // CORS for frontend
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

// ─────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────

/// GET /api/state - Latest snapshot
async fn get_state(State((handle, _)): State<AppState>) -> impl IntoResponse {
    let snapshot = handle.latest();
    Json(ApiResponse::success(snapshot.as_ref().clone()))
}

/// GET /api/orders - Recent orders, oldest first
async fn get_orders(State((handle, _)): State<AppState>) -> impl IntoResponse {
    let snapshot = handle.latest();
    Json(ApiResponse::success(snapshot.orders.clone()))
}

/// GET /api/signals - Recent signals, oldest first
async fn get_signals(State((handle, _)): State<AppState>) -> impl IntoResponse {
    let snapshot = handle.latest();
    Json(ApiResponse::success(snapshot.signals.clone()))
}

/// Queue a command for the driver. Clients watch `/ws` or poll `/api/state`
/// for the applied result.
async fn send_command(
    handle: &DriverHandle,
    command: Command,
    label: &str,
) -> Json<ApiResponse<CommandAck>> {
    match handle.send(command).await {
        Ok(()) => Json(ApiResponse::success(CommandAck::queued(label))),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

/// POST /api/trading/toggle - ACTIVE <-> STOPPED
async fn post_toggle(State((handle, _)): State<AppState>) -> impl IntoResponse {
    send_command(&handle, Command::ToggleTrading, "toggle").await
}

/// POST /api/trading/emergency - Liquidate everything on the next tick
async fn post_emergency(State((handle, _)): State<AppState>) -> impl IntoResponse {
    tracing::warn!("[DASHBOARD] Emergency stop requested");
    send_command(&handle, Command::EmergencyStop, "emergency").await
}

/// POST /api/timeframe {"timeframe":"15m"}
async fn post_timeframe(
    State((handle, _)): State<AppState>,
    Json(request): Json<TimeframeRequest>,
) -> impl IntoResponse {
    match Timeframe::from_str(&request.timeframe) {
        Some(timeframe) => {
            send_command(&handle, Command::SelectTimeframe(timeframe), "timeframe").await
        }
        None => Json(ApiResponse::error(format!(
            "unsupported timeframe '{}'; expected one of 1m, 5m, 15m, 1h",
            request.timeframe
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────
// WebSocket Handler
// ─────────────────────────────────────────────────────────────────

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
};

/// WebSocket upgrade handler
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State((handle, broadcaster)): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, handle, broadcaster))
}

/// Outgoing message type for WebSocket
enum OutgoingMessage {
    Text(String),
    Pong(Vec<u8>),
}

/// Handle WebSocket connection
async fn handle_websocket(
    socket: WebSocket,
    handle: DriverHandle,
    broadcaster: WebSocketBroadcaster,
) {
    use futures_util::{SinkExt, StreamExt};

    tracing::info!("[DASHBOARD] New WebSocket connection");

    let (mut sender, mut receiver) = socket.split();

    // Send initial state
    let msg = WsMessage::FullState(handle.latest().as_ref().clone());
    if let Ok(json) = serde_json::to_string(&msg) {
        if sender.send(Message::Text(json)).await.is_err() {
            return;
        }
    }

    // Subscribe to broadcasts
    let mut rx = broadcaster.subscribe();

    // Channel for outgoing messages
    let (out_tx, mut out_rx) = tokio::sync::mpsc::channel::<OutgoingMessage>(32);

    // Spawn task to send outgoing messages
    let send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let result = match msg {
                OutgoingMessage::Text(text) => sender.send(Message::Text(text)).await,
                OutgoingMessage::Pong(data) => sender.send(Message::Pong(data)).await,
            };
            if result.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            broadcast_msg = rx.recv() => {
                match broadcast_msg {
                    Ok(msg) => {
                        if out_tx.send(OutgoingMessage::Text(msg)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(
                            skipped = skipped,
                            "[DASHBOARD] Slow WebSocket client skipped updates"
                        );
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if out_tx.send(OutgoingMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received WebSocket message: {}", text);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    send_task.abort();
    tracing::info!("[DASHBOARD] WebSocket connection closed");
}
