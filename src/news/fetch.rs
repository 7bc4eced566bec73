//! HTTP JSON fetch with a binary caching policy.
//!
//! A request either carries a revalidate window, in which case a fresh
//! cached body may be served and the request tells intermediaries the
//! response stays fresh that long, or it carries none, in which case the
//! live endpoint is always hit and nothing is stored.
//!
//! No retries happen here; callers own their failure policy.

use crate::error::FetchError;
use crate::utils::redact_url;
use reqwest::Client;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use url::Url;

#[derive(Debug)]
struct CacheEntry {
    body: Value,
    expires_at: Instant,
}

/// Shared, cloneable JSON fetcher.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl FetchClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http(http))
    }

    pub fn with_http(http: Client) -> Self {
        Self {
            http,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// GET `url` and parse the body as JSON.
    ///
    /// With `revalidate`, a cached body younger than the window is returned
    /// without touching the network. A zero window behaves like `None`.
    ///
    /// # Errors
    ///
    /// [`FetchError::UpstreamHttp`] for a non-2xx status, [`FetchError::Timeout`]
    /// when the client timeout elapses, [`FetchError::Decode`] for a non-JSON body.
    #[instrument(
        level = "info",
        skip_all,
        fields(url = %redact_url(url), revalidate = ?revalidate)
    )]
    pub async fn fetch_json(
        &self,
        url: &Url,
        revalidate: Option<Duration>,
    ) -> Result<Value, FetchError> {
        let revalidate = revalidate.filter(|ttl| !ttl.is_zero());

        if revalidate.is_some()
            && let Some(hit) = self.cache_get(url).await
        {
            debug!("Served from cache");
            return Ok(hit);
        }

        let cache_control = match revalidate {
            Some(ttl) => format!("max-age={}", ttl.as_secs()),
            None => "no-store".to_string(),
        };

        let t0 = Instant::now();
        let resp = self
            .http
            .get(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, cache_control)
            .send()
            .await
            .map_err(|e| classify(e, url))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Upstream returned non-success status"
            );
            return Err(FetchError::UpstreamHttp {
                status: status.as_u16(),
                url: redact_url(url),
            });
        }

        let body = resp.text().await.map_err(|e| classify(e, url))?;
        let value: Value = serde_json::from_str(&body)?;
        debug!(bytes = body.len(), elapsed_ms = t0.elapsed().as_millis() as u64, "Fetched JSON");

        if let Some(ttl) = revalidate {
            self.cache_put(url, &value, ttl).await;
        }
        Ok(value)
    }

    async fn cache_get(&self, url: &Url) -> Option<Value> {
        let guard = self.cache.read().await;
        let entry = guard.get(url.as_str())?;
        (Instant::now() <= entry.expires_at).then(|| entry.body.clone())
    }

    async fn cache_put(&self, url: &Url, body: &Value, ttl: Duration) {
        let entry = CacheEntry {
            body: body.clone(),
            expires_at: Instant::now() + ttl,
        };
        let mut guard = self.cache.write().await;
        guard.retain(|_, e| Instant::now() <= e.expires_at);
        guard.insert(url.as_str().to_string(), entry);
    }
}

fn classify(e: reqwest::Error, url: &Url) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: redact_url(url),
        }
    } else {
        FetchError::Transport(e.without_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    fn client() -> FetchClient {
        FetchClient::new(Duration::from_secs(5)).unwrap()
    }

    fn url_for(server: &MockServer, path: &str) -> Url {
        Url::parse(&server.url(path)).unwrap()
    }

    #[tokio::test]
    async fn returns_parsed_json_on_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/news");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([{"headline": "a"}]));
        });

        let value = client().fetch_json(&url_for(&server, "/news"), None).await.unwrap();
        mock.assert();
        assert_eq!(value, json!([{"headline": "a"}]));
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_http_error_with_redacted_url() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/news");
            then.status(503);
        });

        let url = Url::parse(&format!("{}?token=secret", server.url("/news"))).unwrap();
        let err = client().fetch_json(&url, None).await.unwrap_err();
        match err {
            FetchError::UpstreamHttp { status, url } => {
                assert_eq!(status, 503);
                assert!(!url.contains("secret"));
            }
            other => panic!("expected UpstreamHttp, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn revalidate_window_serves_second_call_from_cache() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/news")
                .header("cache-control", "max-age=60");
            then.status(200).json_body(json!([]));
        });

        let c = client();
        let url = url_for(&server, "/news");
        c.fetch_json(&url, Some(Duration::from_secs(60))).await.unwrap();
        c.fetch_json(&url, Some(Duration::from_secs(60))).await.unwrap();
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn no_revalidate_always_hits_network() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/news")
                .header("cache-control", "no-store");
            then.status(200).json_body(json!([]));
        });

        let c = client();
        let url = url_for(&server, "/news");
        c.fetch_json(&url, None).await.unwrap();
        c.fetch_json(&url, None).await.unwrap();
        mock.assert_calls(2);
    }

    #[tokio::test]
    async fn zero_revalidate_is_treated_as_no_cache() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/news");
            then.status(200).json_body(json!([]));
        });

        let c = client();
        let url = url_for(&server, "/news");
        c.fetch_json(&url, Some(Duration::ZERO)).await.unwrap();
        c.fetch_json(&url, Some(Duration::ZERO)).await.unwrap();
        mock.assert_calls(2);
    }

    #[tokio::test]
    async fn failed_response_is_not_cached() {
        let server = MockServer::start();
        let failing = server.mock(|when, then| {
            when.method(GET).path("/news");
            then.status(500);
        });

        let c = client();
        let url = url_for(&server, "/news");
        assert!(c.fetch_json(&url, Some(Duration::from_secs(60))).await.is_err());
        assert!(c.fetch_json(&url, Some(Duration::from_secs(60))).await.is_err());
        failing.assert_calls(2);
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200)
                .delay(Duration::from_secs(2))
                .json_body(json!([]));
        });

        let c = FetchClient::new(Duration::from_millis(100)).unwrap();
        let err = c.fetch_json(&url_for(&server, "/slow"), None).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn non_json_body_is_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/html");
            then.status(200).body("<html></html>");
        });

        let err = client().fetch_json(&url_for(&server, "/html"), None).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
