//! HTTP server exposing stored detections and their statistics.
//!
//! # Routes
//!
//! ```text
//! POST /api/emotions               store one detection
//! GET  /api/emotions               most recent records
//! GET  /api/emotions/{sessionId}   one session's records
//! GET  /api/stats?sessionId=       all-time stats
//! GET  /api/stats/recent?minutes=  stats over a trailing window
//! GET  /health
//! ```
//!
//! Successful responses are wrapped as `{ "success": true, "data": ... }`,
//! failures as `{ "success": false, "error": "..." }`.

use crate::config::Config;
use crate::core::{AggregateStats, QueryError, StatsFilter, StatsQueryEngine};
use crate::gateway::{GatewayError, NewEmotion, PersistenceGateway};
use crate::store::SharedStore;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Record store shared by writes and queries
    pub store: SharedStore,
    /// Maximum records returned by `GET /api/emotions`
    pub list_limit: usize,
    /// Window used when `minutes` is absent
    pub recent_window_minutes: f64,
}

impl ServerConfig {
    pub fn new(port: u16, store: SharedStore) -> Self {
        Self {
            port,
            store,
            list_limit: crate::core::DEFAULT_LIST_LIMIT,
            recent_window_minutes: crate::core::DEFAULT_RECENT_MINUTES,
        }
    }

    pub fn from_config(config: &Config, store: SharedStore) -> Self {
        Self {
            port: config.server_port,
            store,
            list_limit: config.list_limit,
            recent_window_minutes: config.recent_window_minutes,
        }
    }
}

/// Shared server state
pub struct ServerState {
    gateway: PersistenceGateway<SharedStore>,
    queries: StatsQueryEngine<SharedStore>,
    list_limit: usize,
    recent_window_minutes: f64,
}

impl ServerState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            gateway: PersistenceGateway::new(Arc::clone(&config.store)),
            queries: StatsQueryEngine::new(Arc::clone(&config.store)),
            list_limit: config.list_limit,
            recent_window_minutes: config.recent_window_minutes,
        }
    }
}

/// Success envelope
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Error envelope
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.to_string(),
        }),
    )
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::InvalidWindow(_) => api_error(StatusCode::BAD_REQUEST, e),
            QueryError::Store(_) => {
                tracing::error!(error = %e, "Stats query failed");
                api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
            }
        }
    }
}

/// Run a store-backed call on the blocking pool.
async fn blocking<T, F>(state: &Arc<ServerState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ServerState) -> Result<T, ApiError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Store task failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
        })?
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// All-time stats tagged with the session they cover.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Session id, or "all"
    pub session_id: String,
    #[serde(flatten)]
    pub stats: AggregateStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    minutes: Option<String>,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/emotions
async fn create_emotion(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<NewEmotion>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<crate::store::EmotionRecord>>), ApiError> {
    let Json(body) = body.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Rejected malformed emotion record");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("invalid emotion record: {}", rejection.body_text()),
        )
    })?;

    match state.gateway.append_blocking(body).await {
        Ok(record) => Ok((StatusCode::CREATED, ApiResponse::ok(record))),
        Err(e @ GatewayError::Validation(_)) => {
            tracing::warn!(error = %e, "Rejected emotion record");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e))
        }
        Err(e @ GatewayError::Unavailable(_)) => {
            tracing::error!(error = %e, "Failed to store emotion record");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e))
        }
    }
}

/// GET /api/emotions
async fn list_emotions(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<ApiResponse<Vec<crate::store::EmotionRecord>>>, ApiError> {
    let records = blocking(&state, |state| {
        Ok(state.queries.list_recent(state.list_limit)?)
    })
    .await?;
    Ok(ApiResponse::ok(records))
}

/// GET /api/emotions/{sessionId}
async fn session_emotions(
    State(state): State<Arc<ServerState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<crate::store::EmotionRecord>>>, ApiError> {
    let records = blocking(&state, move |state| {
        Ok(state.queries.list_session(&session_id)?)
    })
    .await?;
    Ok(ApiResponse::ok(records))
}

/// GET /api/stats
async fn stats(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<SessionStats>>, ApiError> {
    let session_id = query.session_id.filter(|s| !s.is_empty());
    let filter = StatsFilter {
        session_id: session_id.clone(),
    };
    let stats = blocking(&state, move |state| {
        Ok(state.queries.compute_stats(&filter)?)
    })
    .await?;

    Ok(ApiResponse::ok(SessionStats {
        session_id: session_id.unwrap_or_else(|| "all".to_string()),
        stats,
    }))
}

/// GET /api/stats/recent
async fn recent_stats(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<ApiResponse<crate::core::RecentStats>>, ApiError> {
    let minutes = match query.minutes.as_deref() {
        None => state.recent_window_minutes,
        Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("invalid time window: `{raw}` is not a number"),
            )
        })?,
    };

    let stats = blocking(&state, move |state| {
        Ok(state.queries.compute_recent_stats(minutes)?)
    })
    .await?;
    Ok(ApiResponse::ok(stats))
}

/// Build the router over shared state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/emotions", get(list_emotions).post(create_emotion))
        .route("/api/emotions/:session_id", get(session_emotions))
        .route("/api/stats", get(stats))
        .route("/api/stats/recent", get(recent_stats))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(Arc::new(ServerState::new(&config)));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Mood detector server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
