use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{Json, Router, http::StatusCode, routing::get};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::api;
use crate::config::ServiceConfig;
use crate::pipeline::ForecastService;

const MAX_BODY_BYTES: usize = 64 * 1024;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn index() -> Json<Value> {
    Json(json!({
        "service": "solarcast",
        "version": crate::VERSION,
        "endpoints": [
            "POST /api/data",
            "GET /api/autocomplete?q=",
            "GET /api/reverse-geocode?latitude=&longitude=",
            "GET /health",
        ],
    }))
}

/// Full application router, shared by the server and the integration tests
pub fn app(service: Arc<ForecastService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let timeout = Duration::from_secs(service.config().server.request_timeout_seconds);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .nest("/api", api::router(service))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            timeout,
        ))
        .layer(cors)
}

pub async fn run(config: ServiceConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| "Invalid server host or port")?;
    let tls = config
        .server
        .tls_cert_path
        .clone()
        .zip(config.server.tls_key_path.clone());

    let service = Arc::new(ForecastService::new(config)?);
    let app = app(service);

    #[cfg(feature = "tls")]
    {
        if let Some((cert, key)) = tls {
            let _ = rustls::crypto::ring::default_provider().install_default();
            let rustls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert, &key)
                .await
                .with_context(|| format!("Failed to load TLS certificate {}", cert.display()))?;

            info!("Web server running at https://{}", addr);
            axum_server::bind_rustls(addr, rustls_config)
                .handle(shutdown_handle(shutdown_signal()))
                .serve(app.into_make_service())
                .await
                .with_context(|| "Server error")?;
            return Ok(());
        }
    }

    #[cfg(not(feature = "tls"))]
    {
        if tls.is_some() {
            tracing::warn!("TLS paths configured but the tls feature is disabled, serving plain HTTP");
        }
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Web server running at http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| "Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

/// `axum_server` handle that drains connections once `signal` resolves
#[cfg_attr(not(feature = "tls"), allow(dead_code))]
fn shutdown_handle<F>(signal: F) -> axum_server::Handle
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = axum_server::Handle::new();
    let watcher = handle.clone();
    tokio::spawn(async move {
        signal.await;
        watcher.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });
    handle
}
