use anyhow::Result;
use axum::{Router, routing::get};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::{handlers, state::AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/configs",
            get(handlers::list_configs).post(handlers::create_config),
        )
        // Static segment wins over `:id`
        .route("/configs/pull", get(handlers::pull_config))
        .route(
            "/configs/:id",
            get(handlers::get_config)
                .put(handlers::update_config)
                .delete(handlers::delete_config),
        )
        .route("/configs/:id/versions", get(handlers::list_versions))
        .with_state(Arc::new(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn start_server(state: AppState, bind_address: SocketAddr) -> Result<()> {
    let app = router(state);

    info!("Server listening on {}", bind_address);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
