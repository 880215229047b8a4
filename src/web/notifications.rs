use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use super::{ApiError, AppState};
use crate::auth::RequireUser;
use crate::db::{self, Notification};
use crate::realtime::RealtimeGateway;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    limit: Option<String>,
}

/// GET /notifications
pub async fn list(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let limit = query
        .limit
        .and_then(|l| l.parse::<i64>().ok())
        .unwrap_or(50)
        .clamp(1, 200);

    let notifications = db::get_notifications(state.db.pool(), user.id, limit).await?;
    Ok(Json(notifications))
}

/// POST /notifications/read — mark everything read.
pub async fn mark_read(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = db::mark_notifications_read(state.db.pool(), user.id).await?;
    Ok(Json(json!({ "updated": updated })))
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = db::count_unread_notifications(state.db.pool(), user.id).await?;
    Ok(Json(json!({ "count": count })))
}

/// GET /notifications/ws — push notification payloads to this session.
pub async fn websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Response {
    let gateway = state.realtime.clone();
    let user_id = user.id;
    ws.on_upgrade(move |socket| pump(socket, user_id, gateway))
}

/// Forward gateway payloads until either side goes away. Client frames are
/// drained and ignored; this channel is delivery-only.
async fn pump(mut socket: WebSocket, user_id: i64, gateway: RealtimeGateway) {
    let mut receiver = gateway.subscribe(user_id).await;
    debug!(user_id, "Realtime session opened");

    loop {
        tokio::select! {
            payload = receiver.recv() => match payload {
                Ok(text) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(user_id, skipped, "Realtime subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }

    drop(receiver);
    gateway.release(user_id).await;
    debug!(user_id, "Realtime session closed");
}
