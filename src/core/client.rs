use crate::domain::model::{BoundQuery, Dataset, ExtractionResult, ServicePayload};
use crate::domain::ports::{ConfigProvider, ExtractionService};
use crate::utils::error::ClientError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const EXTRACT_PATH: &str = "/api/extract";
const UPLOAD_FILE_NAME: &str = "dataset.csv";

/// Bounded exponential backoff for transient transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retrying.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): base * 2^(attempt - 1), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    responses: Vec<ServicePayload>,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    error: String,
}

/// Talks to the extraction service over HTTP, one multipart request per batch.
#[derive(Debug, Clone)]
pub struct HttpExtractionClient {
    client: Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl HttpExtractionClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), EXTRACT_PATH),
            retry,
        })
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self, ClientError> {
        let retry = RetryPolicy {
            max_attempts: config.retry_attempts().max(1),
            base_delay: config.retry_base_delay(),
            ..RetryPolicy::default()
        };
        Self::new(config.api_url(), config.request_timeout(), retry)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_form(
        &self,
        selected: &[BoundQuery],
        context: &Dataset,
        template: &str,
        column: &str,
    ) -> Result<Form, ClientError> {
        let queries =
            serde_json::to_string(selected).map_err(|e| ClientError::RequestEncoding {
                message: e.to_string(),
            })?;
        let file = Part::bytes(context.source().as_bytes().to_vec())
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("text/csv")
            .map_err(|e| ClientError::RequestEncoding {
                message: e.to_string(),
            })?;

        Ok(Form::new()
            .part("file", file)
            .text("query", template.to_string())
            .text("column", column.to_string())
            .text("queries", queries))
    }

    async fn send_once(
        &self,
        selected: &[BoundQuery],
        context: &Dataset,
        template: &str,
        column: &str,
    ) -> Result<Vec<ServicePayload>, ClientError> {
        let form = self.build_form(selected, context, template, column)?;

        tracing::debug!("Making API request to: {}", self.endpoint);
        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        tracing::debug!("API response status: {}", status);

        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ServiceErrorBody>(&body)
                .map(|b| b.error)
                .ok()
                .filter(|m| !m.is_empty())
                .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            return Err(ClientError::Transport {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed: ServiceResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse {
                message: e.to_string(),
            })?;
        Ok(parsed.responses)
    }
}

#[async_trait]
impl ExtractionService for HttpExtractionClient {
    async fn submit(
        &self,
        selected: &[BoundQuery],
        context: &Dataset,
        template: &str,
        column: &str,
    ) -> Result<Vec<ExtractionResult>, ClientError> {
        tracing::info!(
            "Submitting {} queries on column '{}' to {}",
            selected.len(),
            column,
            self.endpoint
        );

        let mut attempt = 0;
        let payloads = loop {
            attempt += 1;
            match self.send_once(selected, context, template, column).await {
                Ok(payloads) => break payloads,
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "Attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt,
                        self.retry.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        if payloads.len() != selected.len() {
            return Err(ClientError::ResponseShapeMismatch {
                expected: selected.len(),
                actual: payloads.len(),
            });
        }

        let results = selected
            .iter()
            .zip(payloads)
            .map(|(query, payload)| {
                let raw = context.value(query.index, column).unwrap_or_default();
                ExtractionResult::from_payload(query.index, raw.to_string(), payload)
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!("Received {} results", results.len());
        Ok(results)
    }
}
