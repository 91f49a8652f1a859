//! HTTP server wiring
//!
//! Routes: the three streaming endpoints at the root, auth under `/api`,
//! a health probe, and (when configured) the pre-built SPA bundle as the
//! fallback. Every request is traced; CORS is wide open as in the original
//! deployment.

pub mod handlers;

use crate::config::Settings;
use crate::db;
use crate::errors::Result;
use crate::providers::ProviderRegistry;
use axum::routing::{get, post};
use axum::Router;
use sqlx::MySqlPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared per-process state; everything request-scoped lives in handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub providers: ProviderRegistry,
    pub pool: Option<MySqlPool>,
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/chat", post(handlers::chat))
        .route("/reason", post(handlers::reason))
        .route("/search", post(handlers::search))
        .route("/health", get(handlers::health))
        .nest("/api", crate::auth::router());

    if let Some(dir) = &state.settings.static_dir {
        app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bring the server up and serve until shutdown
pub async fn run(settings: Settings) -> Result<()> {
    settings.validate()?;

    let providers = ProviderRegistry::from_settings(&settings)?;
    let pool = match &settings.database_url {
        Some(url) => Some(db::connect(url).await?),
        None => {
            warn!("DATABASE_URL not set; auth endpoints will reject requests");
            None
        }
    };

    let state = AppState {
        settings: Arc::new(settings),
        providers,
        pool,
    };

    let addr = format!(
        "{}:{}",
        state.settings.server_host, state.settings.server_port
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        %addr,
        chat = state.providers.chat.name(),
        reason = state.providers.reason.name(),
        "server listening"
    );
    axum::serve(listener, router(state)).await?;
    Ok(())
}
