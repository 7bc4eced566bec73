//! News collection: from a watchlist (or none) to a short, ranked article list.
//!
//! # Pipeline
//!
//! 1. [`fetch`]: HTTP JSON with a cache-for-N-seconds or never-cache policy
//! 2. [`provider`]: Finnhub endpoint URLs and response decoding
//! 3. [`normalize`]: validation, canonical formatting, deduplication
//! 4. [`company`] / [`general`]: the two collectors
//! 5. [`NewsAggregator`]: picks a collector from the caller's symbols
//!
//! # Failure behavior
//!
//! The company path degrades per symbol, the general path degrades to an
//! empty list. Only failures neither collector can absorb surface as
//! [`NewsFetchError`].

pub mod company;
pub mod fetch;
pub mod general;
pub mod normalize;
pub mod provider;

use crate::error::NewsFetchError;
use crate::models::{FormattedArticle, SymbolSet};
use crate::utils::date_range;
use provider::NewsProvider;
use tracing::{info, instrument};

/// Number of calendar days (including today) searched for news.
pub const WINDOW_DAYS: u32 = 5;

/// Anything that can turn an optional symbol list into digest articles.
pub trait NewsFeed {
    /// `None`, or symbols that normalize to nothing, mean general market news.
    async fn get_news(
        &self,
        symbols: Option<&[String]>,
    ) -> Result<Vec<FormattedArticle>, NewsFetchError>;
}

/// Chooses between the company and general collectors.
#[derive(Debug, Clone)]
pub struct NewsAggregator {
    provider: NewsProvider,
    window_days: u32,
}

impl NewsAggregator {
    pub fn new(provider: NewsProvider) -> Self {
        Self {
            provider,
            window_days: WINDOW_DAYS,
        }
    }
}

impl NewsFeed for NewsAggregator {
    #[instrument(level = "info", skip_all, fields(requested = symbols.map(<[String]>::len)))]
    async fn get_news(
        &self,
        symbols: Option<&[String]>,
    ) -> Result<Vec<FormattedArticle>, NewsFetchError> {
        let range = date_range(self.window_days).ok_or_else(|| {
            NewsFetchError::new(format!("cannot build a {}-day window", self.window_days))
        })?;

        let symbols = symbols.map(SymbolSet::normalize).unwrap_or_default();
        let articles = if symbols.is_empty() {
            general::collect(&self.provider, &range).await
        } else {
            company::collect(&self.provider, &symbols, &range).await
        };

        info!(
            personalized = !symbols.is_empty(),
            count = articles.len(),
            "News aggregated"
        );
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::provider::test_support::provider_for;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    fn general_mock(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(GET).path("/news").query_param("category", "general");
            then.status(200).json_body(json!([
                {"id": 1, "headline": "Stocks climb", "url": "https://n.test/g1", "datetime": 10}
            ]));
        })
    }

    #[tokio::test]
    async fn no_symbols_uses_general_news_over_five_day_window() {
        let server = MockServer::start();
        let range = date_range(WINDOW_DAYS).unwrap();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/news")
                .query_param("from", range.from.as_str())
                .query_param("to", range.to.as_str());
            then.status(200).json_body(json!([]));
        });

        let news = NewsAggregator::new(provider_for(&server));
        news.get_news(None).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn empty_and_blank_symbols_behave_like_none() {
        let server = MockServer::start();
        let mock = general_mock(&server);
        let news = NewsAggregator::new(provider_for(&server));

        let none = news.get_news(None).await.unwrap();
        let empty = news.get_news(Some(&[])).await.unwrap();
        let blank = news
            .get_news(Some(&["  ".to_string(), String::new()]))
            .await
            .unwrap();

        assert_eq!(none, empty);
        assert_eq!(none, blank);
        mock.assert_calls(3);
    }

    #[tokio::test]
    async fn two_symbols_yield_two_attributed_articles_newest_first() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/company-news").query_param("symbol", "AAPL");
            then.status(200).json_body(json!([
                {"id": 11, "headline": "Apple", "url": "https://n.test/aapl", "datetime": 100}
            ]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/company-news").query_param("symbol", "MSFT");
            then.status(200).json_body(json!([
                {"id": 22, "headline": "Microsoft", "url": "https://n.test/msft", "datetime": 200}
            ]));
        });
        let general = general_mock(&server);

        let news = NewsAggregator::new(provider_for(&server));
        let out = news
            .get_news(Some(&[" aapl".to_string(), "MSFT".to_string()]))
            .await
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!((out[0].id, out[0].related.as_str()), (22, "MSFT"));
        assert_eq!((out[1].id, out[1].related.as_str()), (11, "AAPL"));
        general.assert_calls(0);
    }

    #[tokio::test]
    async fn provider_outage_on_general_path_is_empty_not_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/news");
            then.status(502);
        });

        let news = NewsAggregator::new(provider_for(&server));
        let out = news.get_news(None).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn zero_day_window_is_a_news_fetch_error() {
        let server = MockServer::start();
        let mut news = NewsAggregator::new(provider_for(&server));
        news.window_days = 0;

        let err = news.get_news(None).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch news");
    }
}
