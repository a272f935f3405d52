//! Application startup and lifecycle management.

use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::clock::{Clock, SystemClock};
use crate::config::{ExtractorBackend, FinancingConfig, StoreBackend};
use crate::handlers;
use crate::services::extractor::{RemoteExtractor, RemoteExtractorConfig, SimulatedExtractor};
use crate::services::{
    Extractor, KeyValueStore, LifecycleConfig, LifecycleService, MemoryStore, RedisStore,
    RetryingStore,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: FinancingConfig,
    pub lifecycle: LifecycleService,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from configuration: connect the store, pick
    /// the extractor and bind the listener.
    pub async fn build(config: FinancingConfig) -> Result<Self, AppError> {
        let store: Arc<dyn KeyValueStore> = match config.store.backend {
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; records are lost on restart");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Redis => {
                let redis = RedisStore::connect(&config.store.redis_url)
                    .await
                    .map_err(AppError::InternalError)?;
                Arc::new(redis)
            }
        };
        let store: Arc<dyn KeyValueStore> =
            Arc::new(RetryingStore::new(store, config.store.retry_policy()));

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let extractor: Arc<dyn Extractor> = match config.extraction.backend {
            ExtractorBackend::Simulated => Arc::new(SimulatedExtractor::new(clock.clone())),
            ExtractorBackend::Remote => {
                let endpoint = config.extraction.endpoint.clone().ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "FINANCING_EXTRACTOR_URL is required for the remote extractor"
                    ))
                })?;
                Arc::new(
                    RemoteExtractor::new(RemoteExtractorConfig {
                        endpoint,
                        timeout: Duration::from_secs(config.extraction.timeout_secs),
                    })
                    .map_err(AppError::InternalError)?,
                )
            }
        };
        tracing::info!(extractor = extractor.name(), "Extractor configured");

        Self::build_with(config, store, extractor, clock).await
    }

    /// Build around explicit collaborators. Tests use this to inject a
    /// fixed clock or a scripted extractor.
    pub async fn build_with(
        config: FinancingConfig,
        store: Arc<dyn KeyValueStore>,
        extractor: Arc<dyn Extractor>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let lifecycle = LifecycleService::new(
            store,
            extractor,
            clock,
            LifecycleConfig {
                min_extraction_confidence: config.extraction.min_confidence,
            },
        );

        // Port 0 binds a random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let state = AppState { config, lifecycle };
        let router = router(state);

        tracing::info!("Financing service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/invoices/extract", post(handlers::invoices::extract_invoice))
        .route(
            "/invoices",
            post(handlers::invoices::create_invoice).get(handlers::invoices::list_invoices),
        )
        .route("/invoices/:id", get(handlers::invoices::get_invoice))
        .route("/invoices/:id/offer", get(handlers::invoices::get_offer))
        .route("/invoices/:id/accept", post(handlers::invoices::accept_offer))
        .route("/advances", get(handlers::advances::list_advances))
        .route("/advances/:id", get(handlers::advances::get_advance))
        .route("/advances/:id/paid", post(handlers::advances::mark_paid))
        .route("/settlements", get(handlers::settlements::list_settlements))
        .route("/portfolio/summary", get(handlers::portfolio::summary))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route_layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    owner_id = tracing::field::Empty,
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
