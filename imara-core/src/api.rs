//! HTTP client for the backend's REST endpoints
//!
//! The research stream is the primary interface; these endpoints sit beside
//! it on the same server:
//!
//! - `GET /` - service banner and the agent roster
//! - `GET /health` - liveness and the backing model name
//! - `POST /api/research` - researcher-only, non-streaming run

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::types::QualityMetrics;

/// Response from GET /
#[derive(Debug, Clone, Deserialize)]
pub struct ApiInfo {
    pub message: String,
    pub status: String,
    /// Agent identifiers the backend runs
    #[serde(default)]
    pub agents: Vec<String>,
}

/// Response from GET /health
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// Model backing the agents
    #[serde(default)]
    pub llm: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Result of a one-shot research request
#[derive(Debug, Clone, Deserialize)]
pub struct QuickResearch {
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_metrics")]
    pub metrics: QualityMetrics,
    /// Number of papers retrieved
    #[serde(default)]
    pub papers: u64,
}

fn lenient_metrics<'de, D>(deserializer: D) -> std::result::Result<QualityMetrics, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(QualityMetrics::from_value(&value))
}

/// Response envelope from POST /api/research
#[derive(Debug, Deserialize)]
struct ResearchResponse {
    success: bool,
    #[serde(default)]
    data: Option<QuickResearch>,
    #[serde(default)]
    error: Option<String>,
}

/// Request body for POST /api/research
#[derive(Serialize)]
struct ResearchRequest<'a> {
    query: &'a str,
}

/// HTTP client for the REST endpoints
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new client from configuration
    pub fn new(config: &ServerConfig) -> Result<Self> {
        config.validate_api()?;

        let base_url = config.api_url.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the service banner
    pub async fn info(&self) -> Result<ApiInfo> {
        self.get_json("/").await
    }

    /// Fetch the health report
    pub async fn health(&self) -> Result<HealthStatus> {
        self.get_json("/health").await
    }

    /// Check if the backend is reachable and healthy
    pub async fn health_check(&self) -> Result<bool> {
        match self.health().await {
            Ok(health) => Ok(health.is_healthy()),
            Err(e) => {
                tracing::debug!(error = %e, "Health check failed");
                Ok(false)
            }
        }
    }

    /// Run a researcher-only, non-streaming request
    pub async fn quick_research(&self, query: &str) -> Result<QuickResearch> {
        if query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".to_string()));
        }

        let url = format!("{}/api/research", self.base_url);
        tracing::info!(url = %url, "Submitting quick research request");

        let response = self
            .http_client
            .post(&url)
            .json(&ResearchRequest { query })
            .send()
            .await
            .map_err(|e| Error::Http(format!("HTTP request failed: {}", e)))?;

        let envelope: ResearchResponse = parse_response(response).await?;
        interpret_research_response(envelope)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("HTTP request failed: {}", e)))?;

        parse_response(response).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| Error::Http(format!("failed to parse response: {}", e)))
    } else {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        Err(Error::Http(format!("API error ({}): {}", status, error_text)))
    }
}

fn interpret_research_response(envelope: ResearchResponse) -> Result<QuickResearch> {
    match (envelope.success, envelope.data) {
        (true, Some(data)) => Ok(data),
        (true, None) => Err(Error::Http("response reported success without data".to_string())),
        (false, _) => Err(Error::Backend(
            envelope
                .error
                .unwrap_or_else(|| "unknown backend error".to_string()),
        )),
    }
}
