//! Micro-Climate Server Library
//!
//! Webcam-based urban micro-climate analysis and distribution
//!
//! ## Architecture (5 Components)
//!
//! 1. SourceRegistry - Webcam source definitions and validation
//! 2. Fetcher - Per-source polling, download, retry, scheduling
//! 3. Analyzer - Deterministic image analysis (sun/shadow, weather, comfort)
//! 4. ResultStore - Latest result per webcam, TTL + ordering guard
//! 5. RealtimeHub - WebSocket fan-out of committed results
//!
//! ## Design Principles
//!
//! - Per-source isolation: one failing webcam never stalls the others
//! - Pure analysis: same bytes in, same result out
//! - Results flow one way: fetch -> analyze -> commit -> broadcast

pub mod analyzer;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod realtime_hub;
pub mod result_store;
pub mod source_registry;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
