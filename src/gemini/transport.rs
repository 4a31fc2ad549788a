use crate::config::GeminiConfig;
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Whether a failed generation call is worth retrying with a different
/// request shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Remediable,
    NonRemediable,
}

/// Maps a transport status onto the ladder's retry policy. Only the
/// client-malformed-request class advances the ladder; 404 belongs there
/// because unknown model ids surface as 404 and the model id is one of
/// the ladder's axes. Auth, quota, server and transport failures are not
/// fixable by reshaping the request.
pub fn classify_status(status: StatusCode) -> FailureKind {
    match status.as_u16() {
        400 | 404 | 422 => FailureKind::Remediable,
        _ => FailureKind::NonRemediable,
    }
}

/// Submission seam of the fallback ladder. The ladder only ever sees the
/// parsed response body or a classified error.
#[async_trait]
pub trait GenerateTransport: Send + Sync {
    async fn submit(&self, model: &str, payload: &Value) -> Result<Value>;
}

pub struct HttpTransport {
    client: Client,
    api_base: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }
}

#[async_trait]
impl GenerateTransport for HttpTransport {
    async fn submit(&self, model: &str, payload: &Value) -> Result<Value> {
        let response = self
            .client
            .post(self.endpoint_for_model(model))
            .query(&[("key", self.api_key.as_str())])
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                // The request URL carries the API key; strip it before the
                // error can reach a log line or a chat message.
                let e = e.without_url();
                if e.is_timeout() {
                    RelayError::NonRemediableRequest("generation request timed out".into())
                } else {
                    RelayError::NonRemediableRequest(format!("transport failure: {}", e))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                RelayError::ResponseError(format!(
                    "failed to parse generation response: {}",
                    e.without_url()
                ))
            });
        }

        let body = response.text().await.unwrap_or_default();
        match classify_status(status) {
            FailureKind::Remediable => Err(RelayError::RemediableRequest(format!(
                "{}: {}",
                status, body
            ))),
            FailureKind::NonRemediable => {
                log::debug!("Non-remediable {} reply body: {}", status, body);
                Err(RelayError::NonRemediableRequest(format!(
                    "remote returned {}",
                    status
                )))
            }
        }
    }
}
