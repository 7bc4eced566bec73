//! Error types for every failure family in the digest pipeline.
//!
//! Each collaborator boundary gets its own enum so that the workflow can
//! decide, per stage, whether a failure is a per-item skip or a run abort:
//!
//! - [`FetchError`]: a single call to the news provider failed
//! - [`NewsFetchError`]: the aggregator could not produce a result at all
//! - [`SummarizationError`]: the LLM call failed or timed out
//! - [`DeliveryError`]: the mail transport rejected or dropped a message
//! - [`DirectoryError`]: the user directory could not be read

use thiserror::Error;

/// Failure of one HTTP JSON fetch against the news provider.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider answered with a status outside the success range.
    #[error("API request failed with status {status} at {url}")]
    UpstreamHttp {
        /// The HTTP status code.
        status: u16,
        /// The request URL, with credentials redacted.
        url: String,
    },

    /// The request could not be sent or the body could not be read.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request did not complete within the configured timeout.
    #[error("request timed out at {url}")]
    Timeout {
        /// The request URL, with credentials redacted.
        url: String,
    },

    /// The body was not valid JSON.
    #[error("invalid JSON body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The body was valid JSON but not the shape the caller expected.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
}

/// Aggregator-level failure: no partial result could be produced.
#[derive(Debug, Error)]
#[error("Failed to fetch news")]
pub struct NewsFetchError {
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl NewsFetchError {
    pub fn new(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Failure of the external summarization capability.
#[derive(Debug, Error)]
pub enum SummarizationError {
    /// The model endpoint returned an error.
    #[error("summarization failed: {0}")]
    Upstream(String),

    /// The call exceeded its time budget.
    #[error("summarization timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The client could not be configured (missing config or template).
    #[error("summarizer setup failed: {0}")]
    Setup(String),
}

/// Failure to hand a rendered email to the mail transport.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail API rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("mail delivery timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Failure to read the user directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to read user directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse user directory {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
