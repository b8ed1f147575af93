mod error;
mod health;
mod tariff;

use crate::app::connect_tariff_service;
use crate::config::AppConfig;
use crate::core::TariffService;
use crate::utils::error::Result;
use crate::utils::singleton::SingletonCache;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tower_http::trace::TraceLayer;

pub use error::ErrorBody;
pub use health::HealthResponse;
pub use tariff::RefreshResponse;

struct Inner {
    config: AppConfig,
    service: SingletonCache<TariffService>,
    started_at: DateTime<Utc>,
    started: Instant,
}

/// Shared handler state; the tariff service is built on first use.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self::with_cache(config, SingletonCache::new())
    }

    /// State around an already connected service.
    pub fn with_service(config: AppConfig, service: TariffService) -> Self {
        Self::with_cache(config, SingletonCache::with_value(service))
    }

    fn with_cache(config: AppConfig, service: SingletonCache<TariffService>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                service,
                started_at: Utc::now(),
                started: Instant::now(),
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// A failed build is returned to the caller and retried on the next call.
    pub async fn tariff_service(&self) -> Result<&TariffService> {
        self.inner
            .service
            .get_or_try_init(|| connect_tariff_service(&self.inner.config))
            .await
    }

    pub fn is_ready(&self) -> bool {
        self.inner.service.is_initialized()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started.elapsed().as_secs()
    }

    async fn close(&self) {
        if let Some(service) = self.inner.service.get() {
            service.close().await;
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/tariff", post(tariff::tariff_handler))
        .route("/admin/refresh/{table}", post(tariff::refresh_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting HTTP server on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
