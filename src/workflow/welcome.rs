//! Sign-up welcome email with a model-written introduction.

use crate::error::{DeliveryError, SummarizationError};
use crate::llm::Summarize;
use crate::mailer::{Mailer, WelcomeEmail};
use crate::prompts::welcome_prompt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

/// Used when the model gives no usable intro.
pub const FALLBACK_INTRO: &str =
    "Thanks for joining Signalist. You now have the tools to track markets and make smarter moves.";

/// Answers collected by the sign-up form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpProfile {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub investment_goals: String,
    #[serde(default)]
    pub risk_tolerance: String,
    #[serde(default)]
    pub preferred_industry: String,
}

/// Generate a personalized intro and send the welcome email.
///
/// Model problems never block the email; only a delivery failure is returned.
#[instrument(level = "info", skip_all, fields(email = %profile.email))]
pub async fn send_welcome<S, M>(
    summarizer: &S,
    mailer: &M,
    profile: &SignUpProfile,
    summarize_timeout: Duration,
) -> Result<(), DeliveryError>
where
    S: Summarize,
    M: Mailer,
{
    let prompt = welcome_prompt(profile);
    let answer = timeout(summarize_timeout, summarizer.summarize(&prompt))
        .await
        .unwrap_or(Err(SummarizationError::Timeout(summarize_timeout)));

    let intro = match answer {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!("Model returned an empty intro; using fallback");
            FALLBACK_INTRO.to_string()
        }
        Err(e) => {
            warn!(error = %e, "Could not personalize welcome intro; using fallback");
            FALLBACK_INTRO.to_string()
        }
    };

    mailer
        .send_welcome(&WelcomeEmail {
            email: profile.email.clone(),
            name: profile.name.clone(),
            intro,
        })
        .await?;
    info!("Welcome flow complete");
    Ok(())
}
