//! ResultStore - Latest Analysis Result per Webcam
//!
//! ## Responsibilities
//!
//! - Hold the most-recent `AnalysisResult` per webcam with a staleness TTL
//! - Reject out-of-order writes (per-key timestamp compare-and-swap)
//! - Lazy eviction on read plus a periodic sweep
//! - Optional Redis write-through mirror; falls back transparently to the
//!   in-memory map when Redis is unreachable at startup
//!
//! The in-process map is authoritative for ordering and TTL; the mirror only
//! adds durability for external readers. Callers never observe the
//! difference.

use crate::analyzer::AnalysisResult;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Cached entry: latest result plus its expiry instant
struct CacheEntry {
    result: AnalysisResult,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// ResultStore configuration
#[derive(Debug, Clone)]
pub struct ResultStoreConfig {
    /// Time-to-live for cached results
    pub ttl: Duration,
    /// Redis URL for the write-through mirror; `None` disables mirroring
    pub redis_url: Option<String>,
    /// Key prefix used in the mirror
    pub key_prefix: String,
}

impl Default for ResultStoreConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            redis_url: None,
            key_prefix: "analysis:".to_string(),
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    pub entries: usize,
}

/// ResultStore instance
pub struct ResultStore {
    entries: DashMap<String, CacheEntry>,
    mirror: Option<redis::aio::MultiplexedConnection>,
    /// Serializes mirror sends so they leave in claim order
    mirror_gate: tokio::sync::Mutex<()>,
    /// Newest timestamp already claimed for mirroring, per key
    mirrored: DashMap<String, DateTime<Utc>>,
    config: ResultStoreConfig,
}

impl ResultStore {
    /// Create a memory-only store
    pub fn new(config: ResultStoreConfig) -> Self {
        Self {
            entries: DashMap::new(),
            mirror: None,
            mirror_gate: tokio::sync::Mutex::new(()),
            mirrored: DashMap::new(),
            config,
        }
    }

    /// Create a store, attempting to attach the Redis mirror
    ///
    /// An unreachable Redis is not an error: the store runs memory-only with
    /// identical semantics.
    pub async fn connect(config: ResultStoreConfig) -> Self {
        let mirror = match &config.redis_url {
            Some(url) => match Self::try_connect_redis(url).await {
                Ok(conn) => {
                    tracing::info!(redis_url = %url, "Redis mirror connected");
                    Some(conn)
                }
                Err(e) => {
                    tracing::warn!(
                        redis_url = %url,
                        error = %e,
                        "Redis unreachable, result store running in-memory only"
                    );
                    None
                }
            },
            None => None,
        };

        Self {
            entries: DashMap::new(),
            mirror,
            mirror_gate: tokio::sync::Mutex::new(()),
            mirrored: DashMap::new(),
            config,
        }
    }

    async fn try_connect_redis(url: &str) -> Result<redis::aio::MultiplexedConnection> {
        let client = redis::Client::open(url)?;
        let conn = tokio::time::timeout(
            Duration::from_secs(3),
            client.get_multiplexed_tokio_connection(),
        )
        .await
        .map_err(|_| Error::Cache("redis connect timeout".to_string()))??;
        Ok(conn)
    }

    /// Store a result unless a same-or-newer one is already cached
    ///
    /// Returns whether the write was committed. A rejected stale write is a
    /// silent no-op so retried fetches cannot roll the cache backwards.
    pub async fn put(&self, result: AnalysisResult) -> bool {
        let expires_at = Instant::now() + self.config.ttl;
        let webcam_id = result.webcam_id.clone();

        let committed = {
            use dashmap::mapref::entry::Entry;
            match self.entries.entry(webcam_id.clone()) {
                Entry::Occupied(mut occupied) => {
                    let existing = occupied.get();
                    if existing.is_expired() || result.timestamp > existing.result.timestamp {
                        occupied.insert(CacheEntry {
                            result: result.clone(),
                            expires_at,
                        });
                        true
                    } else {
                        tracing::debug!(
                            webcam_id = %webcam_id,
                            incoming = %result.timestamp,
                            cached = %existing.result.timestamp,
                            "Rejected stale result write"
                        );
                        false
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(CacheEntry {
                        result: result.clone(),
                        expires_at,
                    });
                    true
                }
            }
        };

        if committed {
            self.mirror_write(&webcam_id, &result).await;
        }

        committed
    }

    /// Best-effort write-through to the Redis mirror
    ///
    /// Commits for one key can race here after the map lock is released; the
    /// gate plus the per-key claim keep mirror sends in timestamp order so an
    /// external reader never observes a rollback.
    async fn mirror_write(&self, webcam_id: &str, result: &AnalysisResult) {
        let Some(conn) = &self.mirror else {
            return;
        };

        let _gate = self.mirror_gate.lock().await;
        if !self.claim_mirror_slot(webcam_id, result.timestamp) {
            tracing::debug!(webcam_id = %webcam_id, "Skipped stale mirror write");
            return;
        }

        let json = match serde_json::to_string(result) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(webcam_id = %webcam_id, error = %e, "Mirror serialize failed");
                return;
            }
        };

        let key = format!("{}{}", self.config.key_prefix, webcam_id);
        let mut conn = conn.clone();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(key, json, self.config.ttl.as_secs())
            .await
        {
            tracing::warn!(webcam_id = %webcam_id, error = %e, "Mirror write failed");
        }
    }

    /// Claim the mirror slot for a key if the timestamp is the newest seen
    fn claim_mirror_slot(&self, webcam_id: &str, timestamp: DateTime<Utc>) -> bool {
        use dashmap::mapref::entry::Entry;
        match self.mirrored.entry(webcam_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if timestamp > *occupied.get() {
                    occupied.insert(timestamp);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(timestamp);
                true
            }
        }
    }

    /// Get the current result for a webcam
    ///
    /// Expired entries are evicted lazily and reported as `NotFound`.
    pub fn get(&self, webcam_id: &str) -> Result<AnalysisResult> {
        let expired = match self.entries.get(webcam_id) {
            Some(entry) if !entry.is_expired() => return Ok(entry.result.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(webcam_id, |_, e| e.is_expired());
        }

        Err(Error::NotFound(format!("analysis for webcam {}", webcam_id)))
    }

    /// Snapshot of all current (non-expired) results
    pub fn get_all(&self) -> Vec<AnalysisResult> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.result.clone())
            .collect()
    }

    /// Most recent timestamp across all cached results
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.result.timestamp)
            .max()
    }

    /// Remove expired entries, returning how many were evicted
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }

    /// Spawn the periodic sweep task
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = store.sweep();
                if evicted > 0 {
                    tracing::debug!(evicted = evicted, "Swept expired results");
                }
            }
        })
    }

    /// Whether the Redis mirror is attached
    pub fn mirror_connected(&self) -> bool {
        self.mirror.is_some()
    }

    /// Store statistics
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalysisStatus;

    fn result_at(webcam_id: &str, offset_secs: i64) -> AnalysisResult {
        let base = DateTime::parse_from_rfc3339("2026-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        AnalysisResult::failed(
            webcam_id,
            base + chrono::Duration::seconds(offset_secs),
            AnalysisStatus::Success,
            None,
        )
    }

    fn store_with_ttl(ttl: Duration) -> ResultStore {
        ResultStore::new(ResultStoreConfig {
            ttl,
            redis_url: None,
            key_prefix: "analysis:".into(),
        })
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = store_with_ttl(Duration::from_secs(60));
        assert!(store.put(result_at("cam-1", 0)).await);
        let got = store.get("cam-1").unwrap();
        assert_eq!(got.webcam_id, "cam-1");
    }

    #[tokio::test]
    async fn test_stale_write_rejected() {
        let store = store_with_ttl(Duration::from_secs(60));
        assert!(store.put(result_at("cam-1", 10)).await);

        // Older timestamp: silent no-op
        assert!(!store.put(result_at("cam-1", 5)).await);
        // Equal timestamp: also rejected
        assert!(!store.put(result_at("cam-1", 10)).await);

        let got = store.get("cam-1").unwrap();
        assert_eq!(got.timestamp, result_at("cam-1", 10).timestamp);

        // Strictly newer wins
        assert!(store.put(result_at("cam-1", 11)).await);
        assert_eq!(
            store.get("cam-1").unwrap().timestamp,
            result_at("cam-1", 11).timestamp
        );
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = store_with_ttl(Duration::from_millis(50));
        assert!(store.put(result_at("cam-1", 0)).await);
        assert!(store.get("cam-1").is_ok());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(matches!(store.get("cam-1"), Err(Error::NotFound(_))));
        assert!(store.get_all().is_empty());
    }

    #[tokio::test]
    async fn test_expired_entry_accepts_rewrite() {
        let store = store_with_ttl(Duration::from_millis(50));
        assert!(store.put(result_at("cam-1", 100)).await);
        tokio::time::sleep(Duration::from_millis(80)).await;

        // Entry expired: even an older-stamped result may repopulate it
        assert!(store.put(result_at("cam-1", 90)).await);
        assert!(store.get("cam-1").is_ok());
    }

    #[tokio::test]
    async fn test_get_all_snapshot() {
        let store = store_with_ttl(Duration::from_secs(60));
        store.put(result_at("cam-1", 0)).await;
        store.put(result_at("cam-2", 0)).await;
        store.put(result_at("cam-3", 0)).await;

        let all = store.get_all();
        assert_eq!(all.len(), 3);
        assert_eq!(store.stats().entries, 3);
    }

    #[tokio::test]
    async fn test_sweep_evicts_expired() {
        let store = store_with_ttl(Duration::from_millis(50));
        store.put(result_at("cam-1", 0)).await;
        store.put(result_at("cam-2", 0)).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(store.sweep(), 2);
        assert_eq!(store.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_concurrent_writers_same_key_keep_newest() {
        let store = Arc::new(store_with_ttl(Duration::from_secs(60)));
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.put(result_at("cam-1", i)).await
            }));
        }
        let mut committed = 0usize;
        for handle in handles {
            if handle.await.unwrap() {
                committed += 1;
            }
        }

        // At least the newest write commits; whatever interleaving happened,
        // the store holds exactly one complete record, the one with the
        // maximum timestamp.
        assert!(committed >= 1);
        assert_eq!(store.stats().entries, 1);
        let got = store.get("cam-1").unwrap();
        assert_eq!(got, result_at("cam-1", 15));
    }

    #[test]
    fn test_mirror_claim_rejects_out_of_order_timestamps() {
        let store = store_with_ttl(Duration::from_secs(60));
        let newer = result_at("cam-1", 10).timestamp;
        let older = result_at("cam-1", 5).timestamp;

        assert!(store.claim_mirror_slot("cam-1", newer));
        // A commit that raced in late must not roll the mirror back
        assert!(!store.claim_mirror_slot("cam-1", older));
        assert!(!store.claim_mirror_slot("cam-1", newer));
        assert!(store.claim_mirror_slot("cam-1", result_at("cam-1", 11).timestamp));
        // Other keys are independent
        assert!(store.claim_mirror_slot("cam-2", older));
    }

    #[tokio::test]
    async fn test_concurrent_writers_distinct_keys() {
        let store = Arc::new(store_with_ttl(Duration::from_secs(60)));
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.put(result_at(&format!("cam-{}", i), 0)).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(store.get_all().len(), 8);
    }
}
