//! HTTP client for the per-tenant generator service.
//!
//! Each job is a single `POST {endpoint}` with body `{"tenant_id": "..."}`.
//! Any 2xx counts as success; the body may carry `{"summary": "..."}`, which is
//! surfaced as the job's result summary.

use std::time::Duration;

use cadence_worker::{WorkError, WorkExecutor, WorkOutput};
use futures::future::BoxFuture;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;
use crate::retry::retry_with_backoff;

const ERROR_BODY_LIMIT: usize = 200;

/// Connection and retry settings for [`HttpWorkExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub user_agent: String,
}

impl ExecutorSettings {
    #[must_use]
    pub fn from_app_config(config: &cadence_core::AppConfig) -> Self {
        Self {
            endpoint: config.work_url.clone(),
            timeout_secs: config.work_timeout_secs,
            max_retries: config.work_max_retries,
            backoff_base_ms: config.work_backoff_base_ms,
            user_agent: config.user_agent.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    tenant_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    summary: Option<String>,
}

/// [`WorkExecutor`] backed by the generator's HTTP endpoint.
pub struct HttpWorkExecutor {
    client: Client,
    endpoint: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl HttpWorkExecutor {
    /// Builds the executor from explicit settings.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ExecutorError::InvalidEndpoint`] if
    /// `settings.endpoint` is not a valid absolute URL.
    pub fn new(settings: &ExecutorSettings) -> Result<Self, ExecutorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(settings.user_agent.as_str())
            .build()?;

        let endpoint =
            Url::parse(settings.endpoint.trim()).map_err(|e| ExecutorError::InvalidEndpoint {
                url: settings.endpoint.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint,
            max_retries: settings.max_retries,
            backoff_base_ms: settings.backoff_base_ms,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Runs the generator for one tenant, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - [`ExecutorError::Http`] on network failure after retries.
    /// - [`ExecutorError::Status`] on a non-2xx response that is not
    ///   retriable, or once retries are exhausted.
    pub async fn generate(&self, tenant_id: &str) -> Result<WorkOutput, ExecutorError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.post_once(tenant_id)
        })
        .await
    }

    async fn post_once(&self, tenant_id: &str) -> Result<WorkOutput, ExecutorError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&GenerateRequest { tenant_id })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ExecutorError::Status {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        // A 2xx without a JSON body is still a success.
        let parsed = if body.trim().is_empty() {
            GenerateResponse::default()
        } else {
            serde_json::from_str::<GenerateResponse>(&body).unwrap_or_else(|e| {
                tracing::debug!(tenant_id, error = %e, "executor: ignoring non-JSON success body");
                GenerateResponse::default()
            })
        };

        Ok(WorkOutput {
            summary: parsed.summary,
        })
    }
}

impl WorkExecutor for HttpWorkExecutor {
    fn execute<'a>(&'a self, tenant_id: &'a str) -> BoxFuture<'a, Result<WorkOutput, WorkError>> {
        Box::pin(async move {
            self.generate(tenant_id)
                .await
                .map_err(|e| WorkError::failed(e.to_string()))
        })
    }
}

fn truncate(body: &str, limit: usize) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
