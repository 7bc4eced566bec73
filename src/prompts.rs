//! Prompt templates sent to the summarization model.
//!
//! Placeholders use `{{name}}` syntax and are substituted verbatim.

use crate::models::FormattedArticle;
use crate::workflow::welcome::SignUpProfile;

pub const NEWS_SUMMARY_EMAIL_PROMPT: &str = r#"You are a financial news editor writing the body of a daily market digest email.

Below is a JSON array of news articles selected for one reader. Each article has a headline, summary, source, url, publish time (epoch seconds) and, when the reader follows the company, a related ticker symbol.

Write a concise digest as an HTML fragment (no <html>, <head> or <body> tags):
- Group articles under short section headings: watchlist companies first (by ticker), then broader market news.
- For each article write one or two plain-language sentences explaining what happened and why an investor might care, followed by a "Read more" link to its url.
- Do not invent facts, figures or articles that are not in the data.
- If the array is empty, say there was no notable market news today.

News data:
{{newsData}}
"#;

pub const PERSONALIZED_WELCOME_EMAIL_PROMPT: &str = r#"You are writing the opening paragraph of a welcome email for a new user of Signalist, a stock market tracking app.

Write two or three warm, specific sentences (plain text, no greeting line, no sign-off) that reflect the user's profile below and mention how watchlists, alerts and the daily news digest can help them.

User profile:
{{userProfile}}
"#;

/// Digest prompt embedding `articles` as pretty-printed JSON.
pub fn news_summary_prompt(articles: &[FormattedArticle]) -> Result<String, serde_json::Error> {
    let data = serde_json::to_string_pretty(articles)?;
    Ok(NEWS_SUMMARY_EMAIL_PROMPT.replace("{{newsData}}", &data))
}

/// Welcome prompt embedding the sign-up answers.
pub fn welcome_prompt(profile: &SignUpProfile) -> String {
    let user_profile = format!(
        "- Country: {}\n- Investment goals: {}\n- Risk tolerance: {}\n- Preferred industry: {}",
        profile.country,
        profile.investment_goals,
        profile.risk_tolerance,
        profile.preferred_industry
    );
    PERSONALIZED_WELCOME_EMAIL_PROMPT.replace("{{userProfile}}", &user_profile)
}
