//! Data models for provider articles, normalized articles, and digest runs.
//!
//! This module defines the core data structures used throughout the application:
//! - [`RawArticle`]: an article exactly as the news provider returned it
//! - [`FormattedArticle`]: the fully-populated record handed downstream
//! - [`SymbolSet`]: a cleaned list of ticker symbols
//! - [`DigestUser`], [`UserNews`], [`UserSummary`]: per-user stage outputs of a digest run
//!
//! Optional fields only exist on [`RawArticle`]. Everything after the
//! normalizer works with [`FormattedArticle`], which has no optional fields.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A news article as returned by the provider.
///
/// Every field may be absent or `null`; the provider does not guarantee an
/// `id`, and timestamps are epoch seconds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawArticle {
    pub id: Option<i64>,
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub source: Option<String>,
    pub url: Option<String>,
    pub datetime: Option<f64>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub related: Option<String>,
}

/// The value used to decide whether two raw articles are the same story.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Id(i64),
    Url(String),
    Headline(String),
    /// No usable identity; all such articles collapse into one.
    Missing,
}

impl RawArticle {
    /// First present of `id`, `url`, `headline`, in that priority order.
    ///
    /// Empty strings count as absent.
    pub fn identity_key(&self) -> IdentityKey {
        if let Some(id) = self.id {
            return IdentityKey::Id(id);
        }
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return IdentityKey::Url(url.to_string());
        }
        if let Some(headline) = self.headline.as_deref().filter(|h| !h.is_empty()) {
            return IdentityKey::Headline(headline.to_string());
        }
        IdentityKey::Missing
    }
}

/// A validated, fully-populated article.
///
/// `summary`, `image`, `category`, `source` and `related` are empty strings
/// when the provider omitted them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FormattedArticle {
    pub id: i64,
    pub headline: String,
    pub summary: String,
    pub source: String,
    pub url: String,
    /// Publish time in epoch seconds.
    pub datetime: i64,
    pub image: String,
    pub category: String,
    pub related: String,
}

/// An ordered, deduplicated list of uppercase ticker symbols.
///
/// An empty set means "no personalization": callers fall back to general
/// market news.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolSet(Vec<String>);

impl SymbolSet {
    /// Trim, uppercase, drop empties, and drop repeats (first occurrence wins).
    pub fn normalize<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            symbols
                .into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .unique()
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// A user eligible to receive the daily digest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DigestUser {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// Output of the news-fetch stage for one user.
#[derive(Debug, Clone)]
pub struct UserNews {
    pub user: DigestUser,
    pub articles: Vec<FormattedArticle>,
    /// Whether the articles came from the user's watchlist rather than general news.
    pub had_watchlist: bool,
}

/// Output of the summarization stage for one user.
///
/// `summary` is `None` when no summary could be produced; such users are
/// skipped at delivery.
#[derive(Debug, Clone)]
pub struct UserSummary {
    pub user: DigestUser,
    pub summary: Option<String>,
}
