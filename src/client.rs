//! HTTP client for a remote record API.
//!
//! A detection session that runs apart from the server persists through
//! [`ApiClient`], which posts each labeled sample to `/api/emotions`.

use crate::detection::DetectionSample;
use crate::gateway::{DetectionSink, NewEmotion, PersistOutcome};
use crate::store::EmotionRecord;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Where the record API lives.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `http://127.0.0.1:5000`
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    pub fn emotions_url(&self) -> String {
        format!("{}/api/emotions", self.base_url)
    }

    pub fn stats_url(&self) -> String {
        format!("{}/api/stats", self.base_url)
    }

    pub fn recent_stats_url(&self) -> String {
        format!("{}/api/stats/recent", self.base_url)
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// `{ success, data }` / `{ success: false, error }` response body.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Client for the record API.
pub struct ApiClient {
    config: ApiConfig,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Test connection to the server.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    /// Submit one detection, returning the stored record.
    pub async fn create_emotion(&self, new: &NewEmotion) -> Result<EmotionRecord, ClientError> {
        let response = self
            .client
            .post(self.config.emotions_url())
            .json(new)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::unwrap_envelope(response).await
    }

    /// All-time stats, optionally for one session.
    pub async fn stats(&self, session_id: Option<&str>) -> Result<serde_json::Value, ClientError> {
        let mut request = self.client.get(self.config.stats_url());
        if let Some(session_id) = session_id {
            request = request.query(&[("sessionId", session_id)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::unwrap_envelope(response).await
    }

    /// Stats over the trailing `minutes`.
    pub async fn recent_stats(&self, minutes: f64) -> Result<serde_json::Value, ClientError> {
        let response = self
            .client
            .get(self.config.recent_stats_url())
            .query(&[("minutes", minutes)])
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::unwrap_envelope(response).await
    }

    async fn unwrap_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let envelope: Envelope<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ClientError::Server {
                    status: status.as_u16(),
                    message: text,
                })
            }
            Err(e) => return Err(ClientError::Decode(e.to_string())),
        };

        if !status.is_success() || !envelope.success {
            return Err(ClientError::Server {
                status: status.as_u16(),
                message: envelope
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        envelope
            .data
            .ok_or_else(|| ClientError::Decode("response has no data".to_string()))
    }
}

impl DetectionSink for ApiClient {
    async fn persist(&self, sample: &DetectionSample) -> PersistOutcome {
        match self.create_emotion(&NewEmotion::from_sample(sample)).await {
            Ok(record) => PersistOutcome::Stored { id: record.id },
            Err(ClientError::Server { status, message }) => {
                PersistOutcome::Rejected(format!("{status}: {message}"))
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %self.config.url(), "Record API unreachable");
                PersistOutcome::Unavailable(e.to_string())
            }
        }
    }
}
