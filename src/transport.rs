use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::config::{RetryConfig, ServiceConfig};
use crate::error::{RecipeMuseError, Result};
use crate::models::{ChatRequest, ChatResponse, ImageRequest, ImageResponse};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;
    async fn create_image(&self, req: &ImageRequest) -> Result<ImageResponse>;
}

/// OpenAI-compatible HTTP transport.
pub struct HttpTransport {
    client: Client,
    api_key: String,
    base_url: String,
    retry: RetryConfig,
}

impl HttpTransport {
    pub fn new(service: &ServiceConfig, retry: RetryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(service.request_timeout())
            .build()
            .map_err(|e| RecipeMuseError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: service.api_key()?,
            base_url: service.base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<Req, Resp>(&self, path: &str, req: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let max_attempts = self.retry.max_attempts.max(1);
        let max_duration = self.retry.max_total_duration();
        let start_time = Instant::now();
        let mut attempts = 0;

        while attempts < max_attempts {
            if start_time.elapsed() > max_duration {
                return Err(RecipeMuseError::service(format!(
                    "Request to {path} timed out after {} seconds",
                    max_duration.as_secs()
                )));
            }

            attempts += 1;

            match self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(req)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json().await.map_err(|e| {
                            RecipeMuseError::service(format!(
                                "Failed to parse response from {path}: {e}"
                            ))
                        });
                    }

                    // Client errors other than rate limiting will not improve on retry
                    let retryable = status.is_server_error() || status.as_u16() == 429;
                    if attempts >= max_attempts || !retryable {
                        let body = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        return Err(RecipeMuseError::service(format!(
                            "Recipe service returned {status}: {}",
                            extract_api_message(&body)
                        )));
                    }
                    tracing::warn!(
                        "{} returned {} (attempt {}/{}), retrying",
                        path,
                        status,
                        attempts,
                        max_attempts
                    );
                }
                Err(e) => {
                    if attempts >= max_attempts {
                        return Err(RecipeMuseError::service(format!(
                            "Failed to reach the recipe service after {attempts} attempt(s): {e}"
                        )));
                    }
                    tracing::warn!(
                        "Request to {} failed (attempt {}/{}): {}",
                        path,
                        attempts,
                        max_attempts,
                        e
                    );
                }
            }

            if attempts < max_attempts {
                sleep(self.backoff_delay(attempts)).await;
            }
        }

        Err(RecipeMuseError::service(format!(
            "Request to {path} failed after {max_attempts} attempts"
        )))
    }

    /// Exponential backoff with jitter, capped at `max_delay_ms`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self
            .retry
            .initial_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let jitter = self.retry.jitter_factor;
        let factor = if jitter > 0.0 {
            rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter))
        } else {
            1.0
        };
        let delay = (base as f64 * factor) as u64;
        Duration::from_millis(delay.min(self.retry.max_delay_ms))
    }
}

/// Pull the human-readable message out of an OpenAI-style error body.
fn extract_api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.post_json("chat/completions", req).await
    }

    async fn create_image(&self, req: &ImageRequest) -> Result<ImageResponse> {
        self.post_json("images/generations", req).await
    }
}
