use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{HintError, HintResult};
use crate::models::hint::{HintGenerationRequest, HintGenerationResponse};
use crate::models::HintRecord;

/// External service that turns a question description into hint text.
#[async_trait]
pub trait HintGenerator: Send + Sync {
    async fn generate(&self, request: &HintGenerationRequest) -> HintResult<Vec<HintRecord>>;
}

pub struct HttpHintGenerator {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpHintGenerator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/hints", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl HintGenerator for HttpHintGenerator {
    async fn generate(&self, request: &HintGenerationRequest) -> HintResult<Vec<HintRecord>> {
        let response = self
            .client
            .post(self.endpoint())
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HintError::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    HintError::Generation(format!("Failed to call hint API: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(HintError::Generation(format!(
                "Hint API returned error {}: {}",
                status, error_text
            )));
        }

        let api_response: HintGenerationResponse = response
            .json()
            .await
            .map_err(|e| HintError::Generation(format!("Failed to parse hint API response: {}", e)))?;

        Ok(api_response.hints)
    }
}
