//! Fetcher - Per-Source Polling Pipeline
//!
//! ## Responsibilities
//!
//! - One independent scheduling loop per webcam source, each firing on its
//!   own `fetch_interval_seconds` cadence (no shared timer, no cross-source
//!   head-of-line blocking)
//! - Bounded-timeout image download with capped internal retries and
//!   exponential backoff
//! - Concurrency budget: a semaphore caps simultaneous outbound fetches
//! - Hand-off to the analyzer on the blocking worker pool, keeping CPU work
//!   off the I/O reactor
//! - Commit to the result store and broadcast committed results
//!
//! A failing source keeps its schedule: fetch failures surface as
//! `fetch_error` results carrying the previous cached values, and after a
//! configurable streak the source is logged as degraded but never removed.

use crate::analyzer::{self, AnalysisResult, AnalysisStatus, AnalyzerParams};
use crate::error::{Error, Result};
use crate::realtime_hub::{HubMessage, RealtimeHub};
use crate::result_store::ResultStore;
use crate::source_registry::{SourceRegistry, WebcamSource};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Fetcher configuration
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Timeout for one image download
    pub fetch_timeout: Duration,
    /// Immediate internal retries before a failure is surfaced
    pub max_retries: u32,
    /// First retry delay; doubled per attempt
    pub initial_backoff: Duration,
    /// Retry delay cap
    pub max_backoff: Duration,
    /// Consecutive tick failures before the source is logged as degraded
    pub degraded_after: u32,
    /// Maximum simultaneous outbound fetches across all sources
    pub max_concurrent_fetches: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(4),
            degraded_after: 5,
            max_concurrent_fetches: 8,
        }
    }
}

/// Retry delay schedule: doubling from the initial delay, clamped to the cap
pub fn backoff_schedule(config: &FetcherConfig) -> Vec<Duration> {
    let mut delays = Vec::with_capacity(config.max_retries as usize);
    let mut backoff = config.initial_backoff;
    for _ in 0..config.max_retries {
        delays.push(backoff);
        backoff = (backoff * 2).min(config.max_backoff);
    }
    delays
}

/// Shared pipeline context cloned into every source task
struct Inner {
    store: Arc<ResultStore>,
    hub: Arc<RealtimeHub>,
    params: Arc<AnalyzerParams>,
    client: reqwest::Client,
    limiter: Semaphore,
    config: FetcherConfig,
}

/// Fetcher instance
pub struct Fetcher {
    registry: Arc<SourceRegistry>,
    inner: Arc<Inner>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Fetcher {
    /// Create new Fetcher
    pub fn new(
        registry: Arc<SourceRegistry>,
        store: Arc<ResultStore>,
        hub: Arc<RealtimeHub>,
        params: AnalyzerParams,
        config: FetcherConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(concat!("microclimate-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            registry,
            inner: Arc::new(Inner {
                store,
                hub,
                params: Arc::new(params),
                client,
                limiter: Semaphore::new(config.max_concurrent_fetches),
                config,
            }),
            tasks: Mutex::new(HashMap::new()),
        })
    }

    /// Spawn one polling task per registered source
    pub async fn start(&self) {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            tracing::warn!("Fetcher already running");
            return;
        }

        for source in self.registry.all() {
            let inner = Arc::clone(&self.inner);
            let source = source.clone();
            let id = source.id.clone();
            let handle = tokio::spawn(Self::run_source(inner, source));
            tasks.insert(id, handle);
        }

        tracing::info!(sources = tasks.len(), "Fetcher started");
    }

    /// Cancel all polling tasks and any in-flight fetches
    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        for (id, handle) in tasks.drain() {
            handle.abort();
            tracing::debug!(webcam_id = %id, "Polling task cancelled");
        }
        tracing::info!("Fetcher stopped");
    }

    /// Number of running polling tasks
    pub async fn task_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Independent polling loop for one source
    async fn run_source(inner: Arc<Inner>, source: WebcamSource) {
        let mut ticker = interval(Duration::from_secs(source.fetch_interval_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_failures = 0u32;

        tracing::info!(
            webcam_id = %source.id,
            interval_sec = source.fetch_interval_seconds,
            "Polling loop started"
        );

        loop {
            ticker.tick().await;
            Self::process_tick(&inner, &source, &mut consecutive_failures).await;
        }
    }

    /// One fetch → analyze → commit → broadcast cycle
    async fn process_tick(
        inner: &Arc<Inner>,
        source: &WebcamSource,
        consecutive_failures: &mut u32,
    ) {
        let result = match Self::fetch_frame(inner, source).await {
            Ok(bytes) => {
                *consecutive_failures = 0;
                Self::analyze_bytes(inner, source, bytes).await
            }
            Err(e) => {
                *consecutive_failures += 1;
                if *consecutive_failures == inner.config.degraded_after {
                    tracing::warn!(
                        webcam_id = %source.id,
                        failures = *consecutive_failures,
                        "Source degraded, keeping its schedule"
                    );
                } else {
                    tracing::warn!(
                        webcam_id = %source.id,
                        failures = *consecutive_failures,
                        error = %e,
                        "Fetch failed after retries"
                    );
                }

                let previous = inner.store.get(&source.id).ok();
                AnalysisResult::failed(
                    &source.id,
                    Utc::now(),
                    AnalysisStatus::FetchError,
                    previous.as_ref(),
                )
            }
        };

        Self::commit(inner, result).await;
    }

    /// Download one frame under the global fetch budget
    ///
    /// The budget bounds simultaneous outbound fetches only: the permit is
    /// released as soon as the download finishes, before analysis starts.
    async fn fetch_frame(inner: &Arc<Inner>, source: &WebcamSource) -> Result<Vec<u8>> {
        let _permit = inner
            .limiter
            .acquire()
            .await
            .map_err(|_| Error::Internal("fetch budget closed".to_string()))?;
        fetch_with_retry(&inner.client, &source.url, &inner.config).await
    }

    /// Run the analyzer on the blocking worker pool
    async fn analyze_bytes(
        inner: &Arc<Inner>,
        source: &WebcamSource,
        bytes: Vec<u8>,
    ) -> AnalysisResult {
        let webcam_id = source.id.clone();
        let params = Arc::clone(&inner.params);
        let timestamp = Utc::now();

        let joined = tokio::task::spawn_blocking(move || {
            analyzer::analyze(&webcam_id, timestamp, &bytes, &params)
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(webcam_id = %source.id, error = %e, "Analysis task failed");
                AnalysisResult::failed(&source.id, timestamp, AnalysisStatus::AnalysisError, None)
            }
        }
    }

    /// Commit to the store; broadcast only committed results so subscribers
    /// observe per-source timestamp order
    async fn commit(inner: &Arc<Inner>, result: AnalysisResult) {
        if inner.store.put(result.clone()).await {
            let delivered = inner
                .hub
                .broadcast(HubMessage::analysis_update(&result))
                .await;
            tracing::debug!(
                webcam_id = %result.webcam_id,
                status = ?result.status,
                subscribers = delivered,
                "Result committed"
            );
        } else {
            tracing::debug!(
                webcam_id = %result.webcam_id,
                "Discarded out-of-order result"
            );
        }
    }
}

/// Download image bytes, retrying with exponential backoff
///
/// A non-2xx response or an empty payload counts as a failure just like a
/// network error or timeout.
pub async fn fetch_with_retry(
    client: &reqwest::Client,
    url: &str,
    config: &FetcherConfig,
) -> Result<Vec<u8>> {
    let mut last_err = match fetch_once(client, url).await {
        Ok(bytes) => return Ok(bytes),
        Err(e) => e,
    };

    for (attempt, delay) in backoff_schedule(config).into_iter().enumerate() {
        tracing::debug!(
            url = %url,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %last_err,
            "Retrying fetch"
        );
        tokio::time::sleep(delay).await;

        match fetch_once(client, url).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => last_err = e,
        }
    }

    Err(last_err)
}

async fn fetch_once(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Fetch(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(Error::Fetch(format!("HTTP {}", resp.status())));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| Error::Fetch(e.to_string()))?;
    if bytes.is_empty() {
        return Err(Error::Fetch("empty payload".to_string()));
    }

    Ok(bytes.to_vec())
}
