//! Gateway service: wires state, router, workers and background tasks.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use sc_01_device_auth::{DeviceAuthenticator, SystemTimeSource, TimeSource};
use sc_02_enhancement_pipeline::{EnhancementPipeline, FilterRegistry};
use tokio::task::JoinHandle;
use tracing::info;

use crate::dispatch::{Dispatcher, LiveChannelRegistry};
use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::routes::{build_router, AppState};
use crate::session::SessionStore;

/// API gateway service state
pub struct ApiGatewayService {
    config: GatewayConfig,
    state: AppState,
}

impl ApiGatewayService {
    /// Create the service and start its worker pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(
        config: GatewayConfig,
        time_source: Arc<dyn TimeSource>,
    ) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let filters = Arc::new(
            FilterRegistry::standard().map_err(|e| GatewayError::Internal(e.to_string()))?,
        );
        let authenticator = Arc::new(DeviceAuthenticator::with_time_source(
            config.auth_config(),
            time_source,
        ));
        let sessions = Arc::new(SessionStore::new(&config.api_secret)?);
        let channels = Arc::new(LiveChannelRegistry::new());
        let dispatcher = Arc::new(Dispatcher::start(
            EnhancementPipeline::new(Arc::clone(&filters)),
            Arc::clone(&channels),
            config.workers,
            config.queue_depth,
        ));

        info!(filters = filters.len(), "Filter registry ready");

        Ok(Self {
            config,
            state: AppState {
                authenticator,
                sessions,
                filters,
                channels,
                dispatcher,
            },
        })
    }

    /// Application router
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.config.max_upload_bytes)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;

        let cleanup = self.start_cleanup_tasks();

        info!(addr = %addr, "API gateway listening");
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()));

        cleanup.abort();
        info!("API gateway stopped");
        result
    }

    /// Start background cleanup tasks
    fn start_cleanup_tasks(&self) -> JoinHandle<()> {
        let authenticator = Arc::clone(&self.state.authenticator);
        let period = self.config.purge_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                authenticator.purge_expired();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result = ApiGatewayService::new(GatewayConfig::default());
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[tokio::test]
    async fn test_new_wires_standard_filters() {
        let config = GatewayConfig {
            api_secret: "secret".into(),
            workers: 2,
            ..GatewayConfig::default()
        };
        let service = ApiGatewayService::new(config).unwrap();
        assert_eq!(service.state().filters.len(), 5);
        assert_eq!(service.state().dispatcher.worker_count(), 2);
        assert!(service.state().channels.is_empty());
    }
}
