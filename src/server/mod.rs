pub mod extract;
pub mod handlers;
pub mod state;

use crate::cache::spawn_sweeper;
use crate::config::Config;
use axum::{
    Router,
    http::{HeaderName, HeaderValue},
    middleware,
    response::Response,
    routing::{get, post},
};
use state::AppState;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

/// Stamp every response with the crate version
async fn version_header(mut response: Response) -> Response {
    response.headers_mut().insert(
        HeaderName::from_static("x-lectern-version"),
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}

/// Build the router over already-wired state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::serve_metrics))
        .route(
            "/video-delivery/{course_id}/{lecture_id}/signed-url",
            get(handlers::video::get_signed_url),
        )
        .route(
            "/video-delivery/{course_id}/batch-signed-urls",
            post(handlers::video::get_batch_signed_urls),
        )
        .route("/media/{*key}", get(handlers::media::serve_media))
        .route(
            "/internal/access/{viewer_id}/{course_id}/invalidate",
            post(handlers::access::invalidate_access),
        )
        .layer(middleware::map_response(version_header))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Build backends from `config` and return the full router
pub async fn build_router(config: Config) -> Result<Router, Box<dyn std::error::Error>> {
    Ok(router(AppState::from_config(config).await?))
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);
    let sweep_every = Duration::from_secs(config.cache_sweep_interval_secs);

    // Install the recorder before the first request records anything
    crate::metrics::handle();

    let state = AppState::from_config(config).await?;

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(state.cache.clone(), sweep_every, shutdown.clone());

    let app = router(state);

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("Server listening on http://{}", addr);

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!("Cache sweeper ended abnormally: {}", e);
    }

    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
