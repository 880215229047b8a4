mod admin;
mod ai;
mod auth;
mod collab;
mod error;
mod feed;
mod notifications;
mod posts;
mod routes;
mod uploads;
mod users;

pub use error::ApiError;
pub use routes::router;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::FromRef;
use axum::http::{header, Method};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::ai::LlmClient;
use crate::auth::TokenConfig;
use crate::config::Config;
use crate::db::Database;
use crate::feed::FeedService;
use crate::notify::NotificationService;
use crate::realtime::RealtimeGateway;
use crate::storage::ImageStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub token_config: Arc<TokenConfig>,
    pub feed: FeedService,
    pub notifications: NotificationService,
    pub realtime: RealtimeGateway,
    pub llm: Option<Arc<LlmClient>>,
    pub images: Option<ImageStore>,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.db.pool().clone()
    }
}

impl FromRef<AppState> for Arc<TokenConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.token_config.clone()
    }
}

/// Start the web server.
///
/// # Errors
///
/// Returns an error if the server fails to bind or serve.
pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.web_host, state.config.web_port)
        .parse()
        .context("Invalid web server address")?;

    let app = create_app(state);

    info!(addr = %addr, "Starting web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(listener, app).await.context("Web server error")?;

    Ok(())
}

/// Create the main application router with middleware layers.
pub fn create_app(state: AppState) -> Router {
    let cors = match &state.config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(
                origin.parse().expect("Invalid CORS_ORIGIN"),
            ))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    Router::new()
        .merge(routes::router())
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
