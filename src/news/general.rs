//! Unscoped market news, used when a user has no usable watchlist.

use super::normalize::{Scope, dedupe, format_article, validate};
use super::provider::NewsProvider;
use crate::models::{FormattedArticle, RawArticle};
use crate::utils::DateRange;
use tracing::{error, info, instrument};

pub const QUOTA: usize = 6;

/// Fetch the general feed, keep valid unique articles, and return the first
/// [`QUOTA`] in provider order.
///
/// The provider already orders this feed newest first, so no re-sort is
/// applied. A failed fetch yields an empty list.
#[instrument(level = "info", skip_all, fields(from = %range.from, to = %range.to))]
pub async fn collect(provider: &NewsProvider, range: &DateRange) -> Vec<FormattedArticle> {
    let raw = match provider.general_news(range).await {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, "General market news fetch failed; returning no articles");
            return Vec::new();
        }
    };

    let fetched = raw.len();
    let valid: Vec<RawArticle> = raw.into_iter().filter(validate).collect();
    let articles: Vec<FormattedArticle> = dedupe(valid)
        .iter()
        .take(QUOTA)
        .enumerate()
        .map(|(i, article)| format_article(article, Scope::General, i))
        .collect();

    info!(fetched, count = articles.len(), "Collected general market news");
    articles
}
