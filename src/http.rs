//! JSON-over-HTTP with retry, shared by the embedding and completion
//! providers.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - Network errors (connect, timeout) → retry
//! - HTTP 401/403 → [`CoreError::AuthenticationMissing`], no retry
//! - HTTP 400/413/422 → [`CoreError::RequestRejected`], no retry
//! - Any other 4xx → [`CoreError::ProviderUnavailable`], no retry
//! - Backoff: base, 2×base, 4×base, ... capped at 2^5 × base (base = 1s)
//!
//! Exhausted retries surface as [`CoreError::ProviderUnavailable`]; a body
//! that is not valid JSON as [`CoreError::MalformedResponse`].

use std::time::Duration;

use bugreport_harness_core::CoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A `reqwest` client plus the retry policy applied to every request.
#[derive(Clone)]
pub struct JsonClient {
    client: reqwest::Client,
    label: &'static str,
    max_retries: u32,
    backoff_base: Duration,
}

impl JsonClient {
    /// `label` names the backend in error messages (e.g. `"OpenAI"`).
    pub fn new(label: &'static str, timeout_secs: u64, max_retries: u32) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CoreError::Other(format!("failed to build {} HTTP client: {}", label, e)))?;
        Ok(Self {
            client,
            label,
            max_retries,
            backoff_base: Duration::from_secs(1),
        })
    }

    /// Override the first backoff delay.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// POST `body` as JSON to `url` and decode the JSON response.
    pub async fn post_json<B, R>(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &B,
    ) -> Result<R, CoreError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_base * (1u32 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(url)
                .header("Content-Type", "application/json")
                .json(body);
            for (name, value) in headers {
                request = request.header(*name, value);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(backend = self.label, attempt, error = %e, "request failed");
                    last_err = Some(format!("{} connection error ({}): {}", self.label, url, e));
                    continue;
                }
            };

            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.is_success() {
                return serde_json::from_str(&text).map_err(|e| {
                    CoreError::MalformedResponse(format!("{} response: {}", self.label, e))
                });
            }

            // Rate limited or server error: retry
            if status.as_u16() == 429 || status.is_server_error() {
                tracing::debug!(backend = self.label, attempt, %status, "retryable status");
                last_err = Some(format!("{} API error {}: {}", self.label, status, text));
                continue;
            }

            let message = format!("{} API error {}: {}", self.label, status, text);
            return Err(match status.as_u16() {
                401 | 403 => CoreError::AuthenticationMissing(message),
                400 | 413 | 422 => CoreError::RequestRejected(message),
                _ => CoreError::ProviderUnavailable(message),
            });
        }

        Err(CoreError::ProviderUnavailable(last_err.unwrap_or_else(|| {
            format!("{} request failed after retries", self.label)
        })))
    }
}

/// Read an API key from the environment, treating blank values as unset.
pub fn env_api_key(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Join `base` and `path` without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
