//! App state: store, lookup service, response cache, rate limiter, config.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use bdgeo_cache::{CacheConfig, ResponseCache};
use bdgeo_core::error::Result;
use bdgeo_core::traits::HierarchyStore;
use bdgeo_store::{DocumentStore, MemoryStore};

use crate::lookup::LookupService;
use crate::middleware::{CachedResponse, ClientRateLimiter, RequestMetrics};

/// Deployment environment. Production hides internal error details.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    /// Local development, diagnostics on
    #[default]
    Development,
    /// Production, diagnostics off
    Production,
}

impl Environment {
    /// Whether error responses may carry internal details.
    pub fn diagnostics(&self) -> bool {
        *self != Environment::Production
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(if s.trim().eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        })
    }
}

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Listen port
    pub port: u16,
    /// Document-store directory; `None` serves the embedded dataset
    pub data_dir: Option<PathBuf>,
    /// Upper bound for one document-store read, in milliseconds
    pub store_timeout_ms: u64,
    /// Allowed CORS origins; empty or `*` allows any
    pub cors_origins: Vec<String>,
    /// Rate-limit window in seconds
    pub rate_limit_window_secs: u64,
    /// Requests allowed per window and client; 0 disables limiting
    pub rate_limit_max: u32,
    /// Whether GET responses are cached
    pub enable_cache: bool,
    /// Response cache settings
    pub cache: CacheConfig,
    /// Token required by `POST /cache/clear`; `None` disables the endpoint
    pub admin_token: Option<String>,
    /// Deployment environment
    pub environment: Environment,
}

const DEFAULT_PORT: u16 = 3000;

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: None,
            store_timeout_ms: 5000,
            cors_origins: Vec::new(),
            rate_limit_window_secs: 900,
            rate_limit_max: 100,
            enable_cache: true,
            cache: CacheConfig::default(),
            admin_token: None,
            environment: Environment::Development,
        }
    }
}

/// Reads and parses an environment variable, falling back on absence or garbage.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "Ignoring unparseable environment value");
            default
        }),
        Err(_) => default,
    }
}

impl ApiConfig {
    /// Loads `.env` (if any) and reads the configuration from the environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            port: env_or("PORT", defaults.port),
            data_dir: std::env::var("GEO_DATA_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            store_timeout_ms: env_or("STORE_TIMEOUT_MS", defaults.store_timeout_ms),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            rate_limit_window_secs: env_or("RATE_LIMIT_WINDOW_SECS", defaults.rate_limit_window_secs),
            rate_limit_max: env_or("RATE_LIMIT_MAX", defaults.rate_limit_max),
            enable_cache: std::env::var("ENABLE_CACHE")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            cache: CacheConfig {
                max_keys: env_or("CACHE_MAX_KEYS", defaults.cache.max_keys),
                default_ttl_seconds: env_or("CACHE_TTL_SECS", defaults.cache.default_ttl_seconds),
                check_period_seconds: env_or(
                    "CACHE_CHECK_PERIOD_SECS",
                    defaults.cache.check_period_seconds,
                ),
            },
            admin_token: std::env::var("ADMIN_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            environment: env_or("APP_ENV", defaults.environment),
        }
    }

    /// Document-store read timeout.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Shared state handed to every handler and middleware.
pub struct AppState {
    /// Configuration
    pub config: ApiConfig,
    /// Lookup service over the hierarchy store
    pub lookup: LookupService,
    /// Response cache, injected at construction
    pub cache: Arc<ResponseCache<CachedResponse>>,
    /// Per-client rate limiter; `None` when disabled
    pub limiter: Option<ClientRateLimiter>,
    /// Request and error counters
    pub metrics: RequestMetrics,
    /// Process start, for uptime
    pub started_at: Instant,
}

impl AppState {
    /// Creates state over an existing store, with a fresh cache.
    pub fn new(config: ApiConfig, store: Arc<dyn HierarchyStore>) -> Self {
        let cache = Arc::new(ResponseCache::with_config(config.cache.clone()));
        Self::with_cache(config, store, cache)
    }

    /// Creates state with an explicitly constructed cache.
    pub fn with_cache(
        config: ApiConfig,
        store: Arc<dyn HierarchyStore>,
        cache: Arc<ResponseCache<CachedResponse>>,
    ) -> Self {
        let limiter = ClientRateLimiter::new(
            config.rate_limit_max,
            Duration::from_secs(config.rate_limit_window_secs),
        );

        Self {
            lookup: LookupService::new(store, config.environment.diagnostics()),
            cache,
            limiter,
            metrics: RequestMetrics::default(),
            started_at: Instant::now(),
            config,
        }
    }

    /// Opens the configured store and builds the state around it.
    pub async fn from_config(config: ApiConfig) -> Result<Self> {
        let store: Arc<dyn HierarchyStore> = match &config.data_dir {
            Some(dir) => {
                info!(dir = %dir.display(), "Using document store");
                Arc::new(DocumentStore::connect(dir, config.store_timeout()).await?)
            }
            None => {
                info!("Using embedded dataset");
                Arc::new(MemoryStore::embedded()?)
            }
        };
        Ok(Self::new(config, store))
    }

    /// Seconds since the state was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("PRODUCTION".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("staging".parse::<Environment>().unwrap(), Environment::Development);
        assert!(!Environment::Production.diagnostics());
    }

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.cache.default_ttl_seconds, 300);
        assert_eq!(config.store_timeout(), Duration::from_secs(5));
        assert!(config.admin_token.is_none());
    }

    #[tokio::test]
    async fn test_from_config_embedded() {
        let state = AppState::from_config(ApiConfig::default()).await.unwrap();
        assert_eq!(state.lookup.backend(), "memory");
        assert!(state.limiter.is_some());
    }

    #[tokio::test]
    async fn test_from_config_missing_data_dir() {
        let config = ApiConfig {
            data_dir: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        assert!(AppState::from_config(config).await.is_err());
    }
}
