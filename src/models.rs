//! Shared data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Success response wrapper; handler errors flow through
/// [`Error::into_response`](crate::Error) instead
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { ok: true, data }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub redis_connected: bool,
}

/// System status response
#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatusResponse {
    pub total_webcams: usize,
    pub cached_results: usize,
    pub subscribers: u64,
    pub last_analysis: Option<DateTime<Utc>>,
}
