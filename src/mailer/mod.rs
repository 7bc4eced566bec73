//! Outbound email: welcome messages and daily digests.
//!
//! [`Mailer`] is what the workflows depend on. [`HttpMailer`] implements it
//! against a transactional-mail HTTP API that accepts
//! `{from, to, subject, html, text}` JSON with a bearer key.

pub mod templates;

use crate::error::DeliveryError;
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{info, instrument, warn};
use url::Url;

/// Payload for the sign-up welcome email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeEmail {
    pub email: String,
    pub name: String,
    pub intro: String,
}

/// Payload for one user's daily digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEmail {
    pub email: String,
    pub date: String,
    /// HTML fragment produced by the summarizer.
    pub content: String,
}

/// Hands rendered emails to a mail transport.
pub trait Mailer {
    async fn send_welcome(&self, message: &WelcomeEmail) -> Result<(), DeliveryError>;
    async fn send_digest(&self, message: &DigestEmail) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: String,
    html: String,
    text: &'a str,
}

/// [`Mailer`] that posts JSON to a transactional-mail HTTP API.
#[derive(Clone)]
pub struct HttpMailer {
    http: Client,
    endpoint: Url,
    api_key: String,
    from: String,
    timeout: Duration,
}

impl fmt::Debug for HttpMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMailer")
            .field("endpoint", &self.endpoint.as_str())
            .field("from", &self.from)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpMailer {
    pub fn new(
        endpoint: Url,
        api_key: impl Into<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
            from: from.into(),
            timeout,
        })
    }

    async fn post(&self, email: OutgoingEmail<'_>) -> Result<(), DeliveryError> {
        let resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&email)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %truncate_for_log(&body, 300),
                "Mail API rejected message"
            );
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }
        Ok(())
    }

    fn classify(&self, e: reqwest::Error) -> DeliveryError {
        if e.is_timeout() {
            DeliveryError::Timeout(self.timeout)
        } else {
            DeliveryError::Transport(e)
        }
    }
}

impl Mailer for HttpMailer {
    #[instrument(level = "info", skip_all, fields(email = %message.email))]
    async fn send_welcome(&self, message: &WelcomeEmail) -> Result<(), DeliveryError> {
        self.post(OutgoingEmail {
            from: &self.from,
            to: [&message.email],
            subject: "Welcome to Signalist - your stock market toolkit is ready!".to_string(),
            html: templates::render_welcome(&message.name, &message.intro),
            text: "Thanks for joining Signalist",
        })
        .await?;
        info!("Welcome email sent");
        Ok(())
    }

    #[instrument(level = "info", skip_all, fields(email = %message.email))]
    async fn send_digest(&self, message: &DigestEmail) -> Result<(), DeliveryError> {
        self.post(OutgoingEmail {
            from: &self.from,
            to: [&message.email],
            subject: format!("📈 Market News Summary Today - {}", message.date),
            html: templates::render_digest(&message.date, &message.content),
            text: "Today's market news summary from Signalist",
        })
        .await?;
        info!("Digest email sent");
        Ok(())
    }
}
