use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::{ApiError, AppState};
use crate::auth::{MaybeUser, RequireUser};
use crate::db::{
    self, CommentDisplay, NewNotification, NewPost, NotificationKind, Post, PostCategory,
    PostStatus, User,
};
use crate::feed::PostView;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRequest {
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub is_team_project: bool,
    #[serde(default)]
    pub publish: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnPostView {
    pub id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub status: String,
    pub category: String,
    pub view_count: i64,
    pub is_editor_pick: bool,
    pub published_at: Option<String>,
    pub created_at: String,
}

impl From<Post> for OwnPostView {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            summary: post.summary,
            status: post.status,
            category: post.category,
            view_count: post.view_count,
            is_editor_pick: post.is_editor_pick,
            published_at: post.published_at,
            created_at: post.created_at,
        }
    }
}

fn parse_category(value: Option<&str>) -> PostCategory {
    value
        .and_then(PostCategory::from_str)
        .unwrap_or(PostCategory::Other)
}

/// Fetch a post or 404.
async fn load_post(state: &AppState, id: i64) -> Result<Post, ApiError> {
    db::get_post(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)
}

/// A post is readable by everyone once published; drafts and hidden posts
/// are visible only to their author and admins.
fn check_readable(post: &Post, viewer: Option<&User>) -> Result<(), ApiError> {
    if post.status_enum() == Some(PostStatus::Published) {
        return Ok(());
    }
    match viewer {
        Some(u) if u.id == post.author_id || u.is_admin() => Ok(()),
        _ => Err(ApiError::NotFound),
    }
}

fn check_author(post: &Post, user: &User) -> Result<(), ApiError> {
    if post.author_id == user.id {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// POST /posts
pub async fn create_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<PostRequest>,
) -> Result<Json<OwnPostView>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title is required".into()));
    }

    let post_id = db::insert_post(
        state.db.pool(),
        &NewPost {
            author_id: user.id,
            title: req.title.trim().to_string(),
            summary: req.summary,
            content: req.content,
            tech_stack: req.tech_stack,
            skills: req.skills,
            category: parse_category(req.category.as_deref()),
            is_team_project: req.is_team_project,
            publish: req.publish,
        },
    )
    .await?;

    state.feed.invalidate_feed_cache().await;

    info!(post_id, author_id = user.id, published = req.publish, "Post created");

    let post = load_post(&state, post_id).await?;
    Ok(Json(post.into()))
}

/// GET /posts/:id
///
/// Every successful read bumps the view counter; views are not deduplicated
/// per viewer.
pub async fn get_post(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<PostView>, ApiError> {
    let post = load_post(&state, id).await?;
    check_readable(&post, viewer.as_ref())?;

    db::increment_view_count(state.db.pool(), id).await?;

    let display = db::get_post_display(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(display.into()))
}

/// PUT /posts/:id
pub async fn update_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
    Json(req): Json<PostRequest>,
) -> Result<Json<OwnPostView>, ApiError> {
    let post = load_post(&state, id).await?;
    check_author(&post, &user)?;

    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title is required".into()));
    }

    db::update_post(
        state.db.pool(),
        id,
        req.title.trim(),
        req.summary.as_deref(),
        &req.content,
        &req.tech_stack,
        &req.skills,
        parse_category(req.category.as_deref()).as_str(),
        req.is_team_project,
    )
    .await?;

    state.feed.invalidate_feed_cache().await;

    let post = load_post(&state, id).await?;
    Ok(Json(post.into()))
}

/// POST /posts/:id/publish
pub async fn publish_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Json<OwnPostView>, ApiError> {
    let post = load_post(&state, id).await?;
    check_author(&post, &user)?;

    if post.status_enum() == Some(PostStatus::Hidden) {
        return Err(ApiError::Forbidden);
    }

    db::publish_post(state.db.pool(), id).await?;
    state.feed.invalidate_feed_cache().await;

    info!(post_id = id, "Post published");

    let post = load_post(&state, id).await?;
    Ok(Json(post.into()))
}

/// DELETE /posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let post = load_post(&state, id).await?;
    if post.author_id != user.id && !user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    db::delete_post(state.db.pool(), id).await?;
    state.feed.invalidate_feed_cache().await;

    info!(post_id = id, "Post deleted");

    Ok(Json(json!({ "ok": true })))
}

/// GET /users/:username/posts
pub async fn list_user_posts(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
) -> Result<Json<Vec<OwnPostView>>, ApiError> {
    let author = db::get_user_by_username(state.db.pool(), &username)
        .await?
        .ok_or(ApiError::NotFound)?;

    let include_unpublished = viewer
        .as_ref()
        .map_or(false, |u| u.id == author.id || u.is_admin());

    let posts = db::get_posts_by_author(state.db.pool(), author.id, include_unpublished).await?;
    Ok(Json(posts.into_iter().map(OwnPostView::from).collect()))
}

// ========== Likes & Bookmarks ==========

/// Only published posts accept engagement.
async fn load_published_post(state: &AppState, id: i64) -> Result<Post, ApiError> {
    let post = load_post(state, id).await?;
    if post.status_enum() != Some(PostStatus::Published) {
        return Err(ApiError::NotFound);
    }
    Ok(post)
}

/// POST /posts/:id/like — toggle.
pub async fn toggle_like(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let post = load_published_post(&state, id).await?;

    let liked = if db::like_exists(state.db.pool(), id, user.id).await? {
        db::delete_like(state.db.pool(), id, user.id).await?;
        false
    } else {
        db::insert_like(state.db.pool(), id, user.id).await?;
        state
            .notifications
            .notify(NewNotification {
                user_id: post.author_id,
                kind: NotificationKind::Like,
                actor_id: user.id,
                post_id: Some(id),
                body: format!("{} liked \"{}\"", user.username, post.title),
            })
            .await;
        true
    };

    Ok(Json(json!({ "liked": liked })))
}

/// POST /posts/:id/bookmark — toggle.
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_published_post(&state, id).await?;

    let bookmarked = if db::bookmark_exists(state.db.pool(), id, user.id).await? {
        db::delete_bookmark(state.db.pool(), id, user.id).await?;
        false
    } else {
        db::insert_bookmark(state.db.pool(), id, user.id).await?;
        true
    };

    Ok(Json(json!({ "bookmarked": bookmarked })))
}

/// GET /bookmarks
pub async fn list_bookmarks(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<PostView>>, ApiError> {
    let rows = db::get_bookmarked_posts(state.db.pool(), user.id).await?;
    Ok(Json(rows.into_iter().map(PostView::from).collect()))
}

// ========== Comments ==========

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

/// POST /posts/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<CommentDisplay>, ApiError> {
    let body = req.body.trim();
    if body.is_empty() {
        return Err(ApiError::BadRequest("Comment cannot be empty".into()));
    }

    let post = load_published_post(&state, id).await?;

    let comment_id = db::insert_comment(state.db.pool(), id, user.id, body).await?;

    state
        .notifications
        .notify(NewNotification {
            user_id: post.author_id,
            kind: NotificationKind::Comment,
            actor_id: user.id,
            post_id: Some(id),
            body: format!("{} commented on \"{}\"", user.username, post.title),
        })
        .await;
    state.notifications.notify_mentions(&user, id, body).await;

    let comment = db::get_comment(state.db.pool(), comment_id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("created comment missing")))?;

    Ok(Json(CommentDisplay {
        id: comment.id,
        post_id: comment.post_id,
        author_id: comment.author_id,
        author_username: user.username,
        body: comment.body,
        created_at: comment.created_at,
    }))
}

/// GET /posts/:id/comments
pub async fn list_comments(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<CommentDisplay>>, ApiError> {
    let post = load_post(&state, id).await?;
    check_readable(&post, viewer.as_ref())?;

    let comments = db::get_comments_for_post(state.db.pool(), id).await?;
    Ok(Json(comments))
}

/// DELETE /comments/:id — by the comment author or the post author.
pub async fn delete_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let comment = db::get_comment(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let post = load_post(&state, comment.post_id).await?;
    if comment.author_id != user.id && post.author_id != user.id && !user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    db::delete_comment(state.db.pool(), id).await?;
    Ok(Json(json!({ "ok": true })))
}
