use crate::errors::{UpdateError, UpdateResult};
use crate::version_source::{VersionInfo, VersionSource};
use axum::{
    extract::Extension,
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA},
        Method,
    },
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

pub const NO_STORE: &str = "no-store, no-cache, must-revalidate, proxy-revalidate";

/// Build the router exposing the version endpoint and health check
pub fn build_version_router(source: Arc<VersionSource>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/version", get(current_version))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(Extension(source))
}

async fn current_version(Extension(source): Extension<Arc<VersionSource>>) -> impl IntoResponse {
    let info: VersionInfo = source.current();
    (
        [(CACHE_CONTROL, NO_STORE), (PRAGMA, "no-cache"), (EXPIRES, "0")],
        Json(info),
    )
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Bind `addr` and serve until Ctrl+C or SIGTERM.
pub async fn serve(addr: &str, source: Arc<VersionSource>) -> UpdateResult<()> {
    let app = build_version_router(source);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| UpdateError::io(format!("binding {addr}"), e))?;
    info!("HTTP server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| UpdateError::io("serving HTTP", e))?;

    info!("Server shut down");
    Ok(())
}

pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
