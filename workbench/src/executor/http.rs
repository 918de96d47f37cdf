//! HTTP transport to the execution gateway

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use super::{ExecutionClient, ExecutionRequest, TransportError};
use crate::config::WorkbenchConfig;

/// Longest error body kept in a `TransportError::Status`
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Execution client that POSTs runs to the gateway
#[derive(Debug, Clone)]
pub struct HttpExecutionClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpExecutionClient {
    /// Create a client. `timeout` of None leaves the HTTP layer's defaults in charge.
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            token,
        })
    }

    pub fn from_config(config: &WorkbenchConfig) -> Result<Self> {
        info!("Execution gateway at {}", config.execution_api_url);
        Self::new(
            config.execution_api_url.clone(),
            config.execution_api_token.clone(),
            config.execution_timeout,
        )
    }
}

#[async_trait]
impl ExecutionClient for HttpExecutionClient {
    async fn execute(&self, request: &ExecutionRequest) -> Result<serde_json::Value, TransportError> {
        debug!(
            "Submitting run: language={}, version={}, code_len={}, stdin_len={}",
            request.language_executor_id,
            request.executor_version,
            request.source_code.len(),
            request.stdin.len()
        );

        let mut builder = self.http.post(&self.endpoint).json(&request.to_wire());
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        if body.trim().is_empty() {
            return Err(TransportError::EmptyBody);
        }

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| TransportError::InvalidBody(e.to_string()))?;

        if value.is_null() {
            return Err(TransportError::EmptyBody);
        }

        debug!("Run response received: status={}", status.as_u16());
        Ok(value)
    }
}
