//! # Bangladesh Geo API Server
//!
//! REST API over the division → district → upazila → union hierarchy.
//!
//! ## Endpoints
//!
//! All geo routes live under `/geo/v2.0` and answer GET only:
//!
//! - `GET /divisions`, `/districts`, `/upazilas`, `/unions` - Flat listings
//! - `GET /districts/:division` - Districts of a division (id or name)
//! - `GET /upazilas/:district` - Upazilas of a district (id or name)
//! - `GET /unions/:upazila_id` - Unions of an upazila
//! - `GET /search/:term?type=` - Substring search
//!
//! Ops routes: `GET /health`, `GET /stats`, `GET /cache/stats`, `POST /cache/clear`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bdgeo_api::{ApiConfig, ApiServer};
//!
//! let server = ApiServer::from_config(ApiConfig::from_env()).await?;
//! server.run(([0, 0, 0, 0], 3000)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dto;
mod error;
mod handlers;
mod lookup;
mod middleware;
mod routes;
mod state;

pub use dto::{Envelope, SearchResponse};
pub use error::{ApiError, FieldError};
pub use lookup::LookupService;
pub use middleware::{cache_key, CachedResponse, ClientRateLimiter, RequestMetrics};
pub use routes::{create_router, GEO_API_PREFIX};
pub use state::{ApiConfig, AppState, Environment};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// API server for the geo hierarchy.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Creates a server around prepared state.
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Opens the configured store and creates a server.
    pub async fn from_config(config: ApiConfig) -> bdgeo_core::Result<Self> {
        Ok(Self::new(AppState::from_config(config).await?))
    }

    /// Shared state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Creates the router with all routes and outer layers configured.
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
            .layer(cors_layer(&self.state.config.cors_origins))
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address until Ctrl-C or SIGTERM.
    pub async fn run(self, addr: impl Into<SocketAddr>) -> std::io::Result<()> {
        let addr = addr.into();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!(
            backend = self.state.lookup.backend(),
            cache = self.state.config.enable_cache,
            "Geo API server listening on {}",
            addr
        );

        let housekeeping = spawn_housekeeping(self.state.clone());
        let result = axum::serve(
            listener,
            self.router().into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        if let Some(task) = housekeeping {
            task.abort();
        }
        info!("Server stopped");
        result
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

/// Periodically drops expired cache entries and idle rate-limiter state.
fn spawn_housekeeping(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    let period = state.cache.config().check_period();
    if period.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = state.cache.purge_expired();
            if let Some(limiter) = &state.limiter {
                limiter.retain_recent();
            }
            debug!(purged, keys = state.cache.len(), "Cache sweep");
        }
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Could not install SIGTERM handler");
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
    info!("Shutdown signal received");
}

/// Starts the API server with configuration from the environment.
pub async fn start_server(port: u16) -> std::io::Result<()> {
    let config = ApiConfig {
        port,
        ..ApiConfig::from_env()
    };
    let server = ApiServer::from_config(config)
        .await
        .map_err(std::io::Error::other)?;
    server.run(([0, 0, 0, 0], port)).await
}
