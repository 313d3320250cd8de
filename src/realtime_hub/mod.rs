//! RealtimeHub - WebSocket Fan-Out
//!
//! ## Responsibilities
//!
//! - WebSocket connection management (register/unregister)
//! - Broadcasting analysis updates to every open subscriber
//! - Per-subscriber failure isolation: a dead connection is pruned and the
//!   push continues for the rest
//!
//! The subscriber set is mutated under a narrow write lock; pushes iterate a
//! snapshot copy so no lock is held during delivery. No delivery guarantee is
//! made beyond "delivered if the connection was open at push time" - a
//! reconnecting subscriber fetches the current snapshot over HTTP instead.

use crate::analyzer::AnalysisResult;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Hub message envelope types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubMessage {
    /// New analysis result committed to the store
    AnalysisUpdate {
        webcam_id: String,
        data: AnalysisResult,
        /// Epoch milliseconds of the analyzed frame
        timestamp: i64,
    },
    /// Sent once per new subscription
    ConnectionEstablished { message: String, timestamp: i64 },
}

impl HubMessage {
    pub fn analysis_update(result: &AnalysisResult) -> Self {
        HubMessage::AnalysisUpdate {
            webcam_id: result.webcam_id.clone(),
            timestamp: result.timestamp.timestamp_millis(),
            data: result.clone(),
        }
    }

    pub fn connection_established() -> Self {
        HubMessage::ConnectionEstablished {
            message: "Connected to micro-climate updates".to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Client connection
struct ClientConnection {
    id: Uuid,
    tx: mpsc::UnboundedSender<String>,
}

/// RealtimeHub instance
pub struct RealtimeHub {
    connections: RwLock<HashMap<Uuid, ClientConnection>>,
    connection_count: AtomicU64,
}

impl RealtimeHub {
    /// Create new RealtimeHub
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            connection_count: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, ClientConnection { id, tx });
        }

        self.connection_count.fetch_add(1, Ordering::Relaxed);
        tracing::info!(connection_id = %id, "Subscriber connected");

        (id, rx)
    }

    /// Unregister a subscriber
    pub async fn unregister(&self, id: &Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(id).is_some() {
            self.connection_count.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(connection_id = %id, "Subscriber disconnected");
        }
    }

    /// Broadcast a message to all subscribers
    ///
    /// Dead subscribers are pruned; delivery to the rest is unaffected.
    /// Returns the number of subscribers the message reached.
    pub async fn broadcast(&self, message: HubMessage) -> usize {
        let json = match serde_json::to_string(&message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize hub message");
                return 0;
            }
        };

        // Snapshot the subscriber set so the lock is not held while pushing
        let targets: Vec<(Uuid, mpsc::UnboundedSender<String>)> = {
            let connections = self.connections.read().await;
            connections
                .values()
                .map(|c| (c.id, c.tx.clone()))
                .collect()
        };

        let mut delivered = 0usize;
        let mut dead: Vec<Uuid> = Vec::new();
        for (id, tx) in targets {
            if tx.send(json.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        for id in &dead {
            tracing::warn!(connection_id = %id, "Pruning unreachable subscriber");
            self.unregister(id).await;
        }

        delivered
    }

    /// Send a message to one subscriber
    pub async fn send_to(&self, id: &Uuid, message: HubMessage) {
        let json = match serde_json::to_string(&message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize hub message");
                return;
            }
        };

        let connections = self.connections.read().await;
        if let Some(conn) = connections.get(id) {
            if let Err(e) = conn.tx.send(json) {
                tracing::warn!(connection_id = %id, error = %e, "Failed to send message");
            }
        }
    }

    /// Get subscriber count
    pub fn connection_count(&self) -> u64 {
        self.connection_count.load(Ordering::Relaxed)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}
