//! Router and listener for the Seedreel web front end.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use seedreel_core::SessionManager;
use seedreel_core::config::ServerConfig;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::{health, serve_caption, stream_media};
use crate::realtime::{run_socket, ws_handler};

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    /// Static player assets, if any
    pub public_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(manager: Arc<SessionManager>, public_dir: Option<PathBuf>) -> Self {
        Self {
            manager,
            public_dir,
        }
    }
}

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Builds the application router.
///
/// Browsers open the control channel on `/` like on `/ws`, so the root
/// route upgrades WebSocket requests and serves the player page otherwise.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(root))
        .route("/ws", get(ws_handler))
        .route("/stream/{file_id}", get(stream_media))
        .route("/subtitles/{file_id}/{index}", get(serve_caption))
        .route("/health", get(health));

    if let Some(dir) = &state.public_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    request: Request,
) -> Response {
    if let Ok(ws) = upgrade {
        let manager = state.manager.clone();
        return ws.on_upgrade(move |socket| run_socket(socket, manager));
    }

    match &state.public_dir {
        Some(dir) => ServeFile::new(dir.join("index.html"))
            .oneshot(request)
            .await
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// Serves until Ctrl-C, then retires every session.
///
/// # Errors
/// - `ServerError::Bind` - The listener address is unavailable
/// - `ServerError::Serve` - The server stopped with an I/O error
pub async fn run_server(
    manager: Arc<SessionManager>,
    config: &ServerConfig,
) -> Result<(), ServerError> {
    let address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;

    let app = router(AppState::new(manager.clone(), config.public_dir.clone()));

    info!("Seedreel listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, closing sessions");
    manager.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
