use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use portlink::ai::LlmClient;
use portlink::auth::TokenConfig;
use portlink::cache::{FeedCache, MemoryCache};
use portlink::config::Config;
use portlink::db::{self, Database};
use portlink::feed::FeedService;
use portlink::notify::NotificationService;
use portlink::realtime::RealtimeGateway;
use portlink::storage::ImageStore;
use portlink::web::{self, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Initialize logging
    init_tracing()?;

    info!("Starting portlink");

    // Load and validate configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    // Ensure the database directory exists
    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    // Initialize database
    let database = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    info!("Database initialized");

    // Feed cache is optional by contract; the feed service degrades to
    // direct queries without it.
    let cache: Option<Arc<dyn FeedCache>> = if config.feed_cache_enabled {
        Some(Arc::new(MemoryCache::new()))
    } else {
        info!("Feed cache disabled");
        None
    };

    let feed = FeedService::new(database.clone(), cache);

    let realtime = RealtimeGateway::new();
    let notifications = NotificationService::new(database.clone(), realtime.clone());

    let llm = LlmClient::from_config(&config).map(Arc::new);
    if llm.is_some() {
        info!(model = %config.llm_model, "LLM integration enabled");
    } else {
        info!("LLM integration disabled (no API key)");
    }

    let images = match ImageStore::from_config(&config) {
        Ok(store) => {
            if store.is_some() {
                info!("Image uploads enabled");
            } else {
                info!("Image uploads disabled (no bucket)");
            }
            store
        }
        Err(e) => {
            warn!("Image uploads disabled: {e:#}");
            None
        }
    };

    let token_config = Arc::new(TokenConfig::from_config(&config));

    let state = AppState {
        db: database.clone(),
        config: Arc::new(config),
        token_config,
        feed,
        notifications,
        realtime,
        llm,
        images,
    };

    // Periodically sweep expired refresh tokens
    let cleanup_db = database.clone();
    let cleanup_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match db::delete_expired_refresh_tokens(cleanup_db.pool()).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Expired refresh tokens swept"),
                Err(e) => warn!("Refresh token sweep failed: {e:#}"),
            }
        }
    });

    // Start web server in background
    let web_handle = tokio::spawn(async move {
        if let Err(e) = web::serve(state).await {
            error!("Web server error: {e:#}");
        }
    });

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down...");

    web_handle.abort();
    cleanup_handle.abort();

    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,portlink=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        // Pretty-printed logging for development
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
