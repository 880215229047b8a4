//! Integration tests for the HTTP surface: feed endpoints and post flows.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use portlink::auth::TokenConfig;
use portlink::cache::MemoryCache;
use portlink::config::Config;
use portlink::db::{self, Database};
use portlink::feed::FeedService;
use portlink::notify::NotificationService;
use portlink::realtime::RealtimeGateway;
use portlink::web::{create_app, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn test_config() -> Config {
    Config {
        database_path: PathBuf::from(":memory:"),
        web_host: "127.0.0.1".to_string(),
        web_port: 0,
        cors_origin: None,
        jwt_secret: "test-secret-test-secret-test-secret!".to_string(),
        jwt_issuer: "portlink".to_string(),
        jwt_audience: "portlink-api".to_string(),
        access_token_ttl: Duration::from_secs(900),
        refresh_token_ttl: Duration::from_secs(30 * 86_400),
        feed_cache_enabled: true,
        llm_api_url: "http://127.0.0.1:1".to_string(),
        llm_api_key: None,
        llm_model: "test-model".to_string(),
        llm_daily_quota: 20,
        llm_concurrency: 2,
        s3_bucket: None,
        s3_region: "us-east-1".to_string(),
        s3_endpoint: None,
        s3_prefix: "uploads/".to_string(),
    }
}

async fn test_app() -> (Router, Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");

    let config = test_config();
    let token_config = Arc::new(TokenConfig::from_config(&config));
    let realtime = RealtimeGateway::new();

    let state = AppState {
        db: db.clone(),
        config: Arc::new(config),
        token_config,
        feed: FeedService::new(db.clone(), Some(Arc::new(MemoryCache::new()))),
        notifications: NotificationService::new(db.clone(), realtime.clone()),
        realtime,
        llm: None,
        images: None,
    };

    (create_app(state), db, temp_dir)
}

async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Register a user through the API and return (access token, username).
async fn register(app: &Router, username: &str) -> String {
    let (status, body) = request(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "a-long-enough-password",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["accessToken"].as_str().unwrap().to_string()
}

async fn create_published_post(app: &Router, token: &str, title: &str, tech: Value) -> i64 {
    let (status, body) = request(
        app,
        Method::POST,
        "/posts",
        Some(token),
        Some(json!({
            "title": title,
            "content": format!("{title} content"),
            "techStack": tech,
            "category": "web",
            "publish": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_healthz() {
    let (app, _db, _tmp) = test_app().await;

    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_empty_feed_shape() {
    let (app, _db, _tmp) = test_app().await;

    let (status, body) = request(&app, Method::GET, "/feed", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posts"], json!([]));
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 10);
    assert_eq!(body["pagination"]["total"], 0);
    assert_eq!(body["pagination"]["totalPages"], 0);
}

#[tokio::test]
async fn test_feed_serves_published_posts_with_camel_case_fields() {
    let (app, _db, _tmp) = test_app().await;
    let token = register(&app, "author").await;
    create_published_post(&app, &token, "Shipping a parser", json!(["Rust", "Nom"])).await;

    let (status, body) = request(&app, Method::GET, "/feed", None, None).await;

    assert_eq!(status, StatusCode::OK);
    let post = &body["posts"][0];
    assert_eq!(post["title"], "Shipping a parser");
    assert_eq!(post["techStack"], json!(["Rust", "Nom"]));
    assert_eq!(post["author"]["username"], "author");
    assert_eq!(post["counts"]["likes"], 0);
    assert!(post["publishedAt"].is_string());
}

#[tokio::test]
async fn test_feed_query_params_and_unknown_sort() {
    let (app, _db, _tmp) = test_app().await;
    let token = register(&app, "author").await;
    create_published_post(&app, &token, "react app", json!(["React"])).await;
    create_published_post(&app, &token, "vue app", json!(["Vue"])).await;

    let (status, body) = request(
        &app,
        Method::GET,
        "/feed?techStack=React&sortBy=bogus&page=abc&limit=xyz",
        None,
        None,
    )
    .await;

    // Coercion, never rejection: bad page/limit/sort fall back to defaults.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["posts"][0]["title"], "react app");
}

#[tokio::test]
async fn test_feed_search_matches_title_case_insensitively() {
    let (app, _db, _tmp) = test_app().await;
    let token = register(&app, "author").await;
    create_published_post(&app, &token, "Building a RAFT cluster", json!([])).await;
    create_published_post(&app, &token, "CSS tricks", json!([])).await;

    let (status, body) = request(&app, Method::GET, "/feed?search=raft", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["posts"][0]["title"], "Building a RAFT cluster");
}

#[tokio::test]
async fn test_draft_not_in_feed_until_published() {
    let (app, _db, _tmp) = test_app().await;
    let token = register(&app, "author").await;

    let (_, body) = request(
        &app,
        Method::POST,
        "/posts",
        Some(&token),
        Some(json!({"title": "WIP", "content": "x", "publish": false})),
    )
    .await;
    let post_id = body["id"].as_i64().unwrap();

    let (_, feed) = request(&app, Method::GET, "/feed", None, None).await;
    assert_eq!(feed["pagination"]["total"], 0);

    let (status, _) = request(
        &app,
        Method::POST,
        &format!("/posts/{post_id}/publish"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, feed) = request(&app, Method::GET, "/feed", None, None).await;
    assert_eq!(feed["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_post_detail_increments_views() {
    let (app, _db, _tmp) = test_app().await;
    let token = register(&app, "author").await;
    let post_id = create_published_post(&app, &token, "Counted", json!([])).await;

    let uri = format!("/posts/{post_id}");
    let (_, first) = request(&app, Method::GET, &uri, None, None).await;
    let (_, second) = request(&app, Method::GET, &uri, None, None).await;

    assert_eq!(first["viewCount"], 1);
    assert_eq!(second["viewCount"], 2);
}

#[tokio::test]
async fn test_drafts_are_invisible_to_others() {
    let (app, _db, _tmp) = test_app().await;
    let author = register(&app, "author").await;
    let stranger = register(&app, "stranger").await;

    let (_, body) = request(
        &app,
        Method::POST,
        "/posts",
        Some(&author),
        Some(json!({"title": "Secret", "content": "x", "publish": false})),
    )
    .await;
    let post_id = body["id"].as_i64().unwrap();
    let uri = format!("/posts/{post_id}");

    let (anon, _) = request(&app, Method::GET, &uri, None, None).await;
    assert_eq!(anon, StatusCode::NOT_FOUND);

    let (other, _) = request(&app, Method::GET, &uri, Some(&stranger), None).await;
    assert_eq!(other, StatusCode::NOT_FOUND);

    let (own, _) = request(&app, Method::GET, &uri, Some(&author), None).await;
    assert_eq!(own, StatusCode::OK);
}

#[tokio::test]
async fn test_only_author_edits_and_deletes() {
    let (app, _db, _tmp) = test_app().await;
    let author = register(&app, "author").await;
    let other = register(&app, "other").await;
    let post_id = create_published_post(&app, &author, "Mine", json!([])).await;

    let edit = json!({"title": "Renamed", "content": "x"});
    let (forbidden, _) = request(
        &app,
        Method::PUT,
        &format!("/posts/{post_id}"),
        Some(&other),
        Some(edit.clone()),
    )
    .await;
    assert_eq!(forbidden, StatusCode::FORBIDDEN);

    let (ok, updated) = request(
        &app,
        Method::PUT,
        &format!("/posts/{post_id}"),
        Some(&author),
        Some(edit),
    )
    .await;
    assert_eq!(ok, StatusCode::OK);
    assert_eq!(updated["title"], "Renamed");

    let (del_forbidden, _) = request(
        &app,
        Method::DELETE,
        &format!("/posts/{post_id}"),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(del_forbidden, StatusCode::FORBIDDEN);

    let (deleted, _) = request(
        &app,
        Method::DELETE,
        &format!("/posts/{post_id}"),
        Some(&author),
        None,
    )
    .await;
    assert_eq!(deleted, StatusCode::OK);
}

#[tokio::test]
async fn test_editor_picks_and_admin_flow() {
    let (app, db, _tmp) = test_app().await;
    let author = register(&app, "author").await;
    let admin_token = register(&app, "admin").await;

    // Promote through the database, as an operator would.
    let admin = db::get_user_by_username(db.pool(), "admin")
        .await
        .unwrap()
        .unwrap();
    db::set_user_role(db.pool(), admin.id, "admin").await.unwrap();
    // Role changes take effect on the next issued token.
    let (_, login) = request(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"identifier": "admin", "password": "a-long-enough-password"})),
    )
    .await;
    let admin_token = login["accessToken"].as_str().unwrap_or(&admin_token).to_string();

    let post_id = create_published_post(&app, &author, "Featured", json!([])).await;

    let (status, _) = request(
        &app,
        Method::POST,
        &format!("/admin/posts/{post_id}/editor-pick"),
        Some(&admin_token),
        Some(json!({"picked": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, picks) = request(&app, Method::GET, "/feed/editor-picks", None, None).await;
    assert_eq!(picks[0]["title"], "Featured");

    // Hiding removes the post from the feed (cache is invalidated).
    let (_, feed_before) = request(&app, Method::GET, "/feed", None, None).await;
    assert_eq!(feed_before["pagination"]["total"], 1);

    let (status, _) = request(
        &app,
        Method::POST,
        &format!("/admin/posts/{post_id}/hide"),
        Some(&admin_token),
        Some(json!({"hidden": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, feed_after) = request(&app, Method::GET, "/feed", None, None).await;
    assert_eq!(feed_after["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_trending_tags_endpoint_shape() {
    let (app, _db, _tmp) = test_app().await;
    let token = register(&app, "author").await;
    create_published_post(&app, &token, "a", json!(["React", "Node"])).await;
    create_published_post(&app, &token, "b", json!(["React"])).await;

    let (status, tags) = request(&app, Method::GET, "/feed/trending-tags", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(tags[0]["tag"], "React");
    assert_eq!(tags[0]["count"], 2);
}

#[tokio::test]
async fn test_like_requires_auth_and_toggles() {
    let (app, _db, _tmp) = test_app().await;
    let author = register(&app, "author").await;
    let fan = register(&app, "fan").await;
    let post_id = create_published_post(&app, &author, "Likeable", json!([])).await;
    let uri = format!("/posts/{post_id}/like");

    let (anon, _) = request(&app, Method::POST, &uri, None, None).await;
    assert_eq!(anon, StatusCode::UNAUTHORIZED);

    let (_, liked) = request(&app, Method::POST, &uri, Some(&fan), None).await;
    assert_eq!(liked["liked"], true);

    let (_, unliked) = request(&app, Method::POST, &uri, Some(&fan), None).await;
    assert_eq!(unliked["liked"], false);
}
