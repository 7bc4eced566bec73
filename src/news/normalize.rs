//! Boundary normalization of provider articles.
//!
//! [`validate`] decides whether a raw record is usable at all, [`format_article`]
//! turns a usable record into a [`FormattedArticle`] with no optional fields,
//! and [`dedupe`] drops repeated stories by their identity key.

use crate::models::{FormattedArticle, RawArticle};
use itertools::Itertools;
use serde_json::Value;
use tracing::debug;

/// How an article entered the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// Pulled for a specific ticker; the article is attributed to it.
    Company(&'a str),
    /// Pulled from the unscoped market feed.
    General,
}

/// True iff the headline is non-blank, the url is non-blank, and the
/// publish time is a positive number.
pub fn validate(raw: &RawArticle) -> bool {
    let has_headline = raw.headline.as_deref().is_some_and(|h| !h.trim().is_empty());
    let has_url = raw.url.as_deref().is_some_and(|u| !u.trim().is_empty());
    let has_time = raw.datetime.is_some_and(|t| t.is_finite() && t > 0.0);
    has_headline && has_url && has_time
}

/// Convert a validated raw article into its canonical form.
///
/// `position` is the article's index in the caller's result set; it stands
/// in for the id when the provider sent none. Such ids are only unique
/// within one aggregation call.
pub fn format_article(raw: &RawArticle, scope: Scope<'_>, position: usize) -> FormattedArticle {
    let text = |field: &Option<String>| field.clone().unwrap_or_default();

    let related = match scope {
        Scope::Company(symbol) => symbol.to_string(),
        Scope::General => text(&raw.related),
    };

    FormattedArticle {
        id: raw.id.unwrap_or(position as i64),
        headline: raw.headline.as_deref().unwrap_or_default().trim().to_string(),
        summary: text(&raw.summary),
        source: text(&raw.source),
        url: text(&raw.url),
        datetime: raw.datetime.unwrap_or_default() as i64,
        image: text(&raw.image),
        category: text(&raw.category),
        related,
    }
}

/// Drop repeated articles, keeping the first occurrence of each identity key.
///
/// Survivors keep their original relative order.
pub fn dedupe(articles: Vec<RawArticle>) -> Vec<RawArticle> {
    articles
        .into_iter()
        .unique_by(RawArticle::identity_key)
        .collect()
}

/// Decode a provider response into raw articles.
///
/// The body must be a JSON array. Elements that do not fit the article
/// shape are dropped individually rather than failing the whole response.
pub fn decode_articles(body: Value) -> Result<Vec<RawArticle>, crate::error::FetchError> {
    let Value::Array(items) = body else {
        return Err(crate::error::FetchError::UnexpectedShape(format!(
            "expected an array of articles, got {}",
            kind_of(&body)
        )));
    };

    let total = items.len();
    let articles: Vec<RawArticle> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if articles.len() < total {
        debug!(total, kept = articles.len(), "Dropped malformed article records");
    }
    Ok(articles)
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
