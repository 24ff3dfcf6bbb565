use crate::domain::model::{GeocodeRequest, GeocodeResult};
use crate::domain::ports::Geocoder;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

pub const DEFAULT_ENDPOINT: &str =
    "https://geocoding.geo.census.gov/geocoder/geographies/address";
pub const DEFAULT_BENCHMARK: &str = "Public_AR_Current";
pub const DEFAULT_VINTAGE: &str = "Current_Current";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(1),
            backoff: Backoff::Fixed,
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Pause before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => self
                .delay
                .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1))),
        }
    }

    /// Longest time one lookup can take when every attempt times out.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.max_attempts.max(1);
        let waiting: Duration = (1..attempts).map(|retry| self.delay_for(retry)).sum();
        self.timeout.saturating_mul(attempts) + waiting
    }
}

#[derive(Debug, Error)]
enum AttemptError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(StatusCode),

    #[error("response is not JSON: {0}")]
    Body(#[from] serde_json::Error),
}

/// Structured-address lookup against a Census-style geocoder.
pub struct GeocodeClient {
    client: Client,
    endpoint: String,
    benchmark: String,
    vintage: String,
    policy: RetryPolicy,
}

impl GeocodeClient {
    pub fn new(
        endpoint: impl Into<String>,
        benchmark: impl Into<String>,
        vintage: impl Into<String>,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(policy.timeout)
            .build()
            .map_err(|e| EtlError::ConfigError {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            benchmark: benchmark.into(),
            vintage: vintage.into(),
            policy,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn request_once(&self, request: &GeocodeRequest) -> std::result::Result<serde_json::Value, AttemptError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("street", request.street.as_str()),
                ("city", request.city.as_str()),
                ("state", request.state.as_str()),
                ("zip", request.zip.as_str()),
                ("benchmark", self.benchmark.as_str()),
                ("vintage", self.vintage.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Looks up one address, retrying transient failures.
    ///
    /// Never fails: once the attempts are used up the last error is returned as
    /// a [`GeocodeResult::Failed`] sentinel.
    pub async fn lookup(&self, request: &GeocodeRequest) -> GeocodeResult {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.request_once(request).await {
                Ok(body) => {
                    if attempt > 1 {
                        tracing::debug!("🌐 {}: succeeded on attempt {}", request.duns, attempt);
                    }
                    return GeocodeResult::Response(body);
                }
                Err(e) => {
                    tracing::debug!(
                        "🌐 {}: attempt {}/{} failed: {}",
                        request.duns,
                        attempt,
                        attempts,
                        e
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                sleep(self.policy.delay_for(attempt)).await;
            }
        }

        tracing::warn!(
            "❌ {}: giving up after {} attempts: {}",
            request.duns,
            attempts,
            last_error
        );
        GeocodeResult::Failed {
            error: last_error,
            attempts,
        }
    }
}

#[async_trait]
impl Geocoder for GeocodeClient {
    async fn geocode(&self, request: &GeocodeRequest) -> GeocodeResult {
        self.lookup(request).await
    }
}
