//! Retry and model fallback for whole generations.
//!
//! One attempt covers the request, the streamed reply and, for JSON
//! generations, parsing the reply. A model that answers with prose when
//! an object was asked for is asked again.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use wozif_core::config::RetryConfig;
use wozif_core::error::{Result, WozifError};

/// Whether a failed generation deserves another attempt on the same model.
pub fn is_transient(e: &WozifError) -> bool {
    match e {
        WozifError::LlmRequest(msg) => ["429", "500", "502", "503", "504", "timeout", "connection"]
            .iter()
            .any(|marker| msg.contains(marker)),
        WozifError::LlmStream(_) | WozifError::LlmParse(_) => true,
        _ => false,
    }
}

/// How many times a model is retried, and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// A single attempt per model.
    pub fn once() -> Self {
        Self::new(RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        })
    }

    fn backoff(&self, retry: u32) -> Duration {
        let ms = self
            .config
            .initial_backoff_ms
            .saturating_mul(2u64.saturating_pow(retry))
            .min(self.config.max_backoff_ms);
        let jitter = 0.8 + rand::random::<f64>() * 0.4;
        Duration::from_millis((ms as f64 * jitter) as u64)
    }

    /// Run `attempt` against each model in order. Transient failures are
    /// retried on the same model; anything else, or running out of
    /// retries, moves on to the next model. Returns the first success or
    /// the last error.
    pub async fn run<'m, M, T, F, Fut>(&self, models: &'m [M], mut attempt: F) -> Result<T>
    where
        F: FnMut(&'m M) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_retries = self.config.max_retries;
        let mut last_err = None;

        for (index, model) in models.iter().enumerate() {
            if index > 0 {
                info!(fallback = index, "Trying fallback model");
            }
            for retry in 0..=max_retries {
                match attempt(model).await {
                    Ok(value) => return Ok(value),
                    Err(e) if is_transient(&e) && retry < max_retries => {
                        let backoff = self.backoff(retry);
                        warn!(
                            attempt = retry + 1,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %e,
                            "Retrying generation"
                        );
                        tokio::time::sleep(backoff).await;
                        last_err = Some(e);
                    }
                    Err(e) => {
                        warn!(model = index, error = %e, "Generation failed");
                        last_err = Some(e);
                        break;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| WozifError::LlmRequest("no model configured".into())))
    }
}
