use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{ApiError, AppState};
use crate::auth::RequireAdmin;
use crate::db;

#[derive(Debug, Deserialize)]
pub struct HideRequest {
    pub hidden: bool,
}

#[derive(Debug, Deserialize)]
pub struct PickRequest {
    pub picked: bool,
}

/// POST /admin/posts/:id/hide
pub async fn hide_post(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
    Json(req): Json<HideRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    db::get_post(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)?;

    db::set_post_hidden(state.db.pool(), id, req.hidden).await?;
    state.feed.invalidate_feed_cache().await;

    info!(post_id = id, admin_id = admin.id, hidden = req.hidden, "Post visibility changed");

    Ok(Json(json!({ "hidden": req.hidden })))
}

/// POST /admin/posts/:id/editor-pick
pub async fn editor_pick(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
    Json(req): Json<PickRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    db::get_post(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)?;

    db::set_editor_pick(state.db.pool(), id, req.picked).await?;
    state.feed.invalidate_feed_cache().await;

    info!(post_id = id, admin_id = admin.id, picked = req.picked, "Editor pick changed");

    Ok(Json(json!({ "picked": req.picked })))
}

/// GET /admin/stats
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (users, posts) = tokio::try_join!(
        db::count_users(state.db.pool()),
        db::count_published_posts(state.db.pool()),
    )?;

    Ok(Json(json!({ "users": users, "publishedPosts": posts })))
}
