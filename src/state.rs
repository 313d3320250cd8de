//! Application state
//!
//! Holds all shared components and state

use crate::fetcher::Fetcher;
use crate::realtime_hub::RealtimeHub;
use crate::result_store::ResultStore;
use crate::source_registry::SourceRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Redis URL for the result mirror
    pub redis_url: Option<String>,
    /// Webcam source definitions file; falls back to the built-in set
    pub webcams_config_path: Option<PathBuf>,
    /// Result cache time-to-live
    pub result_ttl: Duration,
    /// Timeout for one image download
    pub fetch_timeout: Duration,
    /// Maximum simultaneous outbound fetches
    pub max_concurrent_fetches: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            redis_url: std::env::var("REDIS_URL").ok(),
            webcams_config_path: std::env::var("WEBCAMS_CONFIG_PATH").ok().map(PathBuf::from),
            result_ttl: Duration::from_secs(
                std::env::var("RESULT_TTL_SEC")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3600),
            ),
            fetch_timeout: Duration::from_secs(
                std::env::var("FETCH_TIMEOUT_SEC")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
            max_concurrent_fetches: std::env::var("MAX_CONCURRENT_FETCHES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Webcam source registry
    pub registry: Arc<SourceRegistry>,
    /// Latest-result cache
    pub store: Arc<ResultStore>,
    /// WebSocket fan-out hub
    pub hub: Arc<RealtimeHub>,
    /// Polling pipeline
    pub fetcher: Arc<Fetcher>,
}
