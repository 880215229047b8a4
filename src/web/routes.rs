use axum::routing::{delete, get, post};
use axum::Router;

use super::{admin, ai, auth, collab, feed, notifications, posts, uploads, users, AppState};

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Feed
        .route("/feed", get(feed::get_feed))
        .route("/feed/editor-picks", get(feed::editor_picks))
        .route("/feed/trending-tags", get(feed::trending_tags))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        // Posts
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/:id",
            get(posts::get_post).put(posts::update_post).delete(posts::delete_post),
        )
        .route("/posts/:id/publish", post(posts::publish_post))
        .route("/posts/:id/like", post(posts::toggle_like))
        .route("/posts/:id/bookmark", post(posts::toggle_bookmark))
        .route(
            "/posts/:id/comments",
            get(posts::list_comments).post(posts::create_comment),
        )
        .route("/comments/:id", delete(posts::delete_comment))
        .route("/bookmarks", get(posts::list_bookmarks))
        // Users & profiles
        .route("/profile", get(users::get_own_profile).put(users::update_profile))
        .route("/users/:username", get(users::get_user))
        .route("/users/:username/posts", get(posts::list_user_posts))
        .route(
            "/users/:username/follow",
            post(users::follow).delete(users::unfollow),
        )
        .route("/users/:username/followers", get(users::list_followers))
        .route("/users/:username/following", get(users::list_following))
        .route("/users/:username/endorse", post(users::endorse))
        .route("/users/:username/match", get(users::match_score))
        .route("/dashboard", get(users::dashboard))
        // Collaborations
        .route(
            "/collaborations",
            get(collab::list_collaborations).post(collab::create_collaboration),
        )
        .route("/collaborations/:id/respond", post(collab::respond))
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/read", post(notifications::mark_read))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/ws", get(notifications::websocket))
        // AI
        .route("/ai/evaluate/:post_id", post(ai::evaluate))
        .route("/ai/interview-questions", post(ai::interview_questions))
        .route("/ai/writing-assist", post(ai::writing_assist))
        // Uploads
        .route("/uploads/avatar", post(uploads::upload_avatar))
        .route("/uploads/cover", post(uploads::upload_cover))
        // Admin
        .route("/admin/posts/:id/hide", post(admin::hide_post))
        .route("/admin/posts/:id/editor-pick", post(admin::editor_pick))
        .route("/admin/stats", get(admin::stats))
        // Health
        .route("/healthz", get(health))
}

async fn health() -> &'static str {
    "OK"
}
