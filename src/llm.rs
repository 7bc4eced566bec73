//! LLM summarization with exponential backoff retry logic.
//!
//! The digest and welcome flows only need one capability from a model:
//! turn a prompt into text, or fail. This module provides it behind a
//! small trait so the workflow can be driven by a fake in tests.
//!
//! # Architecture
//!
//! - [`Summarize`]: core trait defining async prompt-to-text
//! - [`AwfulSummarizer`]: wraps the `awful_aj` OpenAI-compatible client
//! - [`RetrySummarizer`]: decorator that adds retry logic to any [`Summarize`] implementation
//!
//! # Retry Strategy
//!
//! - Bounded number of retries (3 by default in `main`)
//! - Exponential backoff from a base delay, capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd
//! - Setup errors are never retried

use crate::error::SummarizationError;
use awful_aj::api::ask;
use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Trait for async prompt-to-text summarization.
pub trait Summarize {
    /// Send `prompt` to the model and return its text answer.
    async fn summarize(&self, prompt: &str) -> Result<String, SummarizationError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`Summarize`] implementation.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..max_jitter)
/// ```
pub struct RetrySummarizer<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    max_jitter: Duration,
}

impl<T> RetrySummarizer<T>
where
    T: Summarize,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }

    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=self.max_jitter.as_millis() as u64);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetrySummarizer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySummarizer")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Summarize for RetrySummarizer<T>
where
    T: Summarize,
{
    #[instrument(level = "info", skip_all)]
    async fn summarize(&self, prompt: &str) -> Result<String, SummarizationError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.summarize(prompt).await {
                Ok(text) => return Ok(text),
                Err(e @ SummarizationError::Setup(_)) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "summarize() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "summarize() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// [`Summarize`] backed by `awful_aj`'s chat API.
///
/// The prompt is sent as the user turn of the loaded chat template.
#[derive(Debug)]
pub struct AwfulSummarizer {
    config: AwfulJadeConfig,
    template: ChatTemplate,
}

impl AwfulSummarizer {
    /// Load the client config (default: `config.yaml` in the `awful_aj`
    /// config dir) and the named chat template.
    #[instrument(level = "info", skip_all, fields(template = %template_name))]
    pub async fn load(
        config_path: Option<&str>,
        template_name: &str,
    ) -> Result<Self, SummarizationError> {
        let config_path = match config_path {
            Some(path) => path.to_string(),
            None => config_dir()
                .map_err(|e| SummarizationError::Setup(format!("no config dir: {e}")))?
                .join("config.yaml")
                .to_string_lossy()
                .into_owned(),
        };

        let config = config::load_config(&config_path)
            .map_err(|e| SummarizationError::Setup(format!("{config_path}: {e}")))?;
        let template = template::load_template(template_name)
            .await
            .map_err(|e| SummarizationError::Setup(format!("template {template_name}: {e}")))?;

        info!(%config_path, "Loaded LLM configuration");
        Ok(Self { config, template })
    }
}

impl Summarize for AwfulSummarizer {
    #[instrument(level = "info", skip_all, fields(prompt_bytes = prompt.len()))]
    async fn summarize(&self, prompt: &str) -> Result<String, SummarizationError> {
        let t0 = Instant::now();
        let res = ask(&self.config, prompt.to_string(), &self.template, None, None).await;
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        match res {
            Ok(text) => {
                info!(elapsed_ms, bytes = text.len(), "Model answered");
                Ok(text)
            }
            Err(e) => {
                warn!(elapsed_ms, error = %e, "API call failed");
                Err(SummarizationError::Upstream(e.to_string()))
            }
        }
    }
}
