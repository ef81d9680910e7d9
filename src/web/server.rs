use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState, SharedState};
use super::session::SessionStore;
use crate::config::ServerConfig;
use crate::github::{GitHubClient, GitHubGateway};
use crate::notification::Dispatcher;
use crate::store::MemoryStore;
use crate::usecase::Usecase;

/// Build the full application router: API, HTML shell and `/js` assets.
pub fn build_router(state: SharedState, static_dir: &Path) -> Router {
    api::api_router()
        .nest_service("/js", ServeDir::new(static_dir.join("js")))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire the GitHub client, store and dispatcher into shared state.
pub fn build_state(config: &ServerConfig) -> Result<SharedState> {
    let github: Arc<dyn GitHubGateway> = Arc::new(
        GitHubClient::new(config.github.clone()).context("Failed to initialize GitHub client")?,
    );
    let dispatcher = Dispatcher::new(&config.notify).context("Failed to initialize notifier")?;
    let usecase = Usecase::new(github.clone(), Arc::new(MemoryStore::new()), dispatcher);

    Ok(Arc::new(AppState {
        usecase,
        github,
        sessions: SessionStore::default(),
        behind_proxy: config.behind_proxy,
    }))
}

/// Start the server and run until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let state = build_state(&config)?;
    let app = build_router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, github = %config.github.domain, "prchecklist starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router(static_dir: &Path) -> Router {
        let state = build_state(&ServerConfig::default()).unwrap();
        build_router(state, static_dir)
    }

    #[tokio::test]
    async fn test_health_via_full_router() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = test_router(dir.path()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_serves_static_js() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("js")).unwrap();
        std::fs::write(dir.path().join("js/bundle.js"), "console.log(1);").unwrap();

        let req = Request::builder()
            .uri("/js/bundle.js")
            .body(Body::empty())
            .unwrap();
        let resp = test_router(dir.path()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"console.log(1);");
    }

    #[tokio::test]
    async fn test_missing_static_js_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::builder()
            .uri("/js/missing.js")
            .body(Body::empty())
            .unwrap();
        let resp = test_router(dir.path()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_api_routes_mounted() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::builder()
            .uri("/api/me")
            .body(Body::empty())
            .unwrap();
        let resp = test_router(dir.path()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
