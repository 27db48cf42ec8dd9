//! Analysis service client
//!
//! Posts a normalized trial document to the remote statistics service and
//! returns its JSON result. No retries: a failed submission leaves the trial
//! unprocessed and the next run picks it up again.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

use crate::models::NormalizedDocument;

const USER_AGENT: &str = concat!("trialist-processor/", env!("CARGO_PKG_VERSION"));

/// Submission errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Analysis service returned {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Remote analysis of one normalized document
#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    /// Submit `document`, returning the service's JSON object on success
    async fn submit(&self, document: &NormalizedDocument) -> Result<Map<String, Value>, GatewayError>;
}

/// HTTP client for the analysis service
pub struct HttpAnalysisGateway {
    http_client: reqwest::Client,
    url: String,
}

impl HttpAnalysisGateway {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AnalysisGateway for HttpAnalysisGateway {
    async fn submit(&self, document: &NormalizedDocument) -> Result<Map<String, Value>, GatewayError> {
        tracing::debug!(url = %self.url, data_points = document.data.len(), "Submitting normalized document");

        let response = self
            .http_client
            .post(&self.url)
            .json(document)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status(status.as_u16(), error_text));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        match body {
            Value::Object(map) => Ok(map),
            other => Err(GatewayError::Parse(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }
}
