//! API Routes

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};

use crate::models::ApiResponse;
use crate::realtime_hub::HubMessage;
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/healthz", get(super::health_check))
        .route("/api/status", get(super::system_status))
        // Webcams
        .route("/api/webcams", get(list_webcams))
        .route("/api/webcams/:id", get(get_webcam))
        // Analysis results
        .route("/api/analysis", get(list_analysis))
        .route("/api/analysis/:webcam_id", get(get_analysis))
        // WebSocket
        .route("/api/ws", get(websocket_handler))
        .with_state(state)
}

// ========================================
// Webcam Handlers
// ========================================

async fn list_webcams(State(state): State<AppState>) -> impl IntoResponse {
    let webcams = state.registry.all().to_vec();
    Json(ApiResponse::success(webcams))
}

async fn get_webcam(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.registry.get(&id) {
        Ok(webcam) => Json(ApiResponse::success(webcam.clone())).into_response(),
        Err(e) => e.into_response(),
    }
}

// ========================================
// Analysis Handlers
// ========================================

async fn list_analysis(State(state): State<AppState>) -> impl IntoResponse {
    let mut results = state.store.get_all();
    results.sort_by(|a, b| a.webcam_id.cmp(&b.webcam_id));
    Json(ApiResponse::success(results))
}

async fn get_analysis(
    State(state): State<AppState>,
    Path(webcam_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&webcam_id) {
        Ok(result) => Json(ApiResponse::success(result)).into_response(),
        Err(e) => e.into_response(),
    }
}

// ========================================
// WebSocket Handler
// ========================================

/// WebSocket upgrade handler
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut rx) = state.hub.register().await;
    tracing::info!(connection_id = %conn_id, "WebSocket client connected");

    state
        .hub
        .send_to(&conn_id, HubMessage::connection_established())
        .await;

    // Forward hub messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Drain incoming frames; the stream is push-only
    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Ping(data)) => {
                    // Pong is handled automatically by axum
                    tracing::trace!("Received ping: {:?}", data);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(connection_id = %conn_id, "WebSocket client disconnected");
                    break;
                }
                Err(e) => {
                    tracing::warn!(connection_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
        conn_id
    });

    // Wait for either task to complete
    let conn_id = tokio::select! {
        _ = send_task => conn_id,
        result = recv_task => result.unwrap_or(conn_id),
    };

    state.hub.unregister(&conn_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AnalysisResult, AnalysisStatus, AnalyzerParams};
    use crate::fetcher::{Fetcher, FetcherConfig};
    use crate::result_store::{ResultStore, ResultStoreConfig};
    use crate::realtime_hub::RealtimeHub;
    use crate::source_registry::{SourceRegistry, WebcamSource};
    use crate::state::AppConfig;
    use chrono::Utc;
    use std::sync::Arc;

    fn test_source(id: &str) -> WebcamSource {
        WebcamSource {
            id: id.to_string(),
            name: format!("Cam {}", id),
            url: "https://example.com/cam.jpg".to_string(),
            latitude: 35.0,
            longitude: 139.0,
            city: "Tokyo".to_string(),
            country: "Japan".to_string(),
            fetch_interval_seconds: 60,
        }
    }

    async fn test_state() -> AppState {
        let registry = Arc::new(
            SourceRegistry::from_sources(vec![test_source("cam-1"), test_source("cam-2")])
                .unwrap(),
        );
        let store = Arc::new(ResultStore::new(ResultStoreConfig::default()));
        let hub = Arc::new(RealtimeHub::new());
        let fetcher = Arc::new(
            Fetcher::new(
                Arc::clone(&registry),
                Arc::clone(&store),
                Arc::clone(&hub),
                AnalyzerParams::default(),
                FetcherConfig::default(),
            )
            .unwrap(),
        );
        AppState {
            config: AppConfig::default(),
            registry,
            store,
            hub,
            fetcher,
        }
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        use tower::util::ServiceExt;
        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .uri(uri)
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_healthz() {
        let router = create_router(test_state().await);
        let (status, body) = get_body(router, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["redis_connected"], false);
    }

    #[tokio::test]
    async fn test_list_webcams() {
        let router = create_router(test_state().await);
        let (status, body) = get_body(router, "/api/webcams").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_webcam_not_found() {
        let router = create_router(test_state().await);
        let (status, body) = get_body(router, "/api/webcams/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_get_analysis_round_trip() {
        let state = test_state().await;
        let result =
            AnalysisResult::failed("cam-1", Utc::now(), AnalysisStatus::Success, None);
        state.store.put(result).await;

        let router = create_router(state);
        let (status, body) = get_body(router.clone(), "/api/analysis/cam-1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["webcam_id"], "cam-1");

        let (status, _) = get_body(router.clone(), "/api/analysis/cam-2").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get_body(router, "/api/analysis").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_status_counts() {
        let state = test_state().await;
        state
            .store
            .put(AnalysisResult::failed(
                "cam-1",
                Utc::now(),
                AnalysisStatus::Success,
                None,
            ))
            .await;

        let router = create_router(state);
        let (status, body) = get_body(router, "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_webcams"], 2);
        assert_eq!(body["cached_results"], 1);
        assert_eq!(body["subscribers"], 0);
    }
}
