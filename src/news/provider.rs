//! Finnhub news endpoints.
//!
//! Two endpoints are used:
//!
//! | Endpoint | Query | Used by |
//! |----------|-------|---------|
//! | `company-news` | `symbol`, `from`, `to`, `token` | [`super::company`] |
//! | `news` | `category=general`, `from`, `to`, `token` | [`super::general`] |
//!
//! Both answer with a JSON array of [`RawArticle`]-shaped objects.

use super::fetch::FetchClient;
use super::normalize::decode_articles;
use crate::error::FetchError;
use crate::models::RawArticle;
use crate::utils::DateRange;
use std::fmt;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

/// Finnhub news endpoints behind a shared [`FetchClient`].
#[derive(Clone)]
pub struct NewsProvider {
    fetch: FetchClient,
    base: Url,
    token: String,
    general_ttl: Option<Duration>,
}

impl fmt::Debug for NewsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsProvider")
            .field("base", &self.base.as_str())
            .field("token", &"***")
            .field("general_ttl", &self.general_ttl)
            .finish()
    }
}

impl NewsProvider {
    pub fn new(fetch: FetchClient, base: Url, token: impl Into<String>) -> Self {
        Self {
            fetch,
            base,
            token: token.into(),
            general_ttl: None,
        }
    }

    /// Let the general feed be served from cache for `ttl`.
    ///
    /// Company news is always fetched live.
    pub fn with_general_ttl(mut self, ttl: Duration) -> Self {
        self.general_ttl = Some(ttl);
        self
    }

    /// News for one ticker within `range`.
    pub async fn company_news(
        &self,
        symbol: &str,
        range: &DateRange,
    ) -> Result<Vec<RawArticle>, FetchError> {
        let mut url = self.endpoint("company-news");
        url.query_pairs_mut()
            .append_pair("symbol", symbol)
            .append_pair("from", &range.from)
            .append_pair("to", &range.to)
            .append_pair("token", &self.token);
        let body = self.fetch.fetch_json(&url, None).await?;
        decode_articles(body)
    }

    /// The unscoped "general" market feed within `range`.
    pub async fn general_news(&self, range: &DateRange) -> Result<Vec<RawArticle>, FetchError> {
        let mut url = self.endpoint("news");
        url.query_pairs_mut()
            .append_pair("category", "general")
            .append_pair("from", &range.from)
            .append_pair("to", &range.to)
            .append_pair("token", &self.token);
        let body = self.fetch.fetch_json(&url, self.general_ttl).await?;
        decode_articles(body)
    }

    fn endpoint(&self, name: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name);
        }
        url
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use httpmock::MockServer;

    pub(crate) const TOKEN: &str = "test-token";

    pub(crate) fn provider_for(server: &MockServer) -> NewsProvider {
        let fetch = FetchClient::new(Duration::from_secs(5)).unwrap();
        NewsProvider::new(fetch, Url::parse(&server.base_url()).unwrap(), TOKEN)
    }

    pub(crate) fn range() -> DateRange {
        DateRange {
            from: "2026-10-14".into(),
            to: "2026-10-18".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let fetch = FetchClient::new(Duration::from_secs(1)).unwrap();
        let p = NewsProvider::new(fetch, Url::parse(DEFAULT_BASE_URL).unwrap(), "t");
        assert_eq!(p.endpoint("news").as_str(), "https://finnhub.io/api/v1/news");

        let fetch = FetchClient::new(Duration::from_secs(1)).unwrap();
        let p = NewsProvider::new(fetch, Url::parse("https://finnhub.io/api/v1/").unwrap(), "t");
        assert_eq!(p.endpoint("company-news").as_str(), "https://finnhub.io/api/v1/company-news");
    }

    #[test]
    fn test_debug_hides_token() {
        let fetch = FetchClient::new(Duration::from_secs(1)).unwrap();
        let p = NewsProvider::new(fetch, Url::parse(DEFAULT_BASE_URL).unwrap(), "secret");
        assert!(!format!("{p:?}").contains("secret"));
    }

    #[tokio::test]
    async fn company_news_sends_symbol_range_and_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/company-news")
                .query_param("symbol", "AAPL")
                .query_param("from", "2026-10-14")
                .query_param("to", "2026-10-18")
                .query_param("token", TOKEN);
            then.status(200)
                .json_body(json!([{"id": 1, "headline": "h", "url": "u", "datetime": 5}]));
        });

        let articles = provider_for(&server).company_news("AAPL", &range()).await.unwrap();
        mock.assert();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].id, Some(1));
    }

    #[tokio::test]
    async fn general_news_requests_general_category() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/news")
                .query_param("category", "general")
                .query_param("token", TOKEN);
            then.status(200).json_body(json!([]));
        });

        let articles = provider_for(&server).general_news(&range()).await.unwrap();
        mock.assert();
        assert!(articles.is_empty());
    }

    #[tokio::test]
    async fn general_ttl_caches_the_feed() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/news");
            then.status(200).json_body(json!([]));
        });

        let p = provider_for(&server).with_general_ttl(Duration::from_secs(300));
        p.general_news(&range()).await.unwrap();
        p.general_news(&range()).await.unwrap();
        mock.assert_calls(1);
    }
}
