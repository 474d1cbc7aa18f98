//! HTTP fetcher for single pages
//!
//! One GET per page with a fixed identifying user agent. There is no retry
//! and no redirect handling beyond what reqwest provides. Every successful
//! fetch is followed by a fixed delay, which bounds the request rate of one
//! session without throttling other sessions.

use crate::config::CrawlerConfig;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors from fetching one page
///
/// Both variants are branch-local from the traversal's point of view: the
/// failing page's subtree is abandoned, the session keeps running.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request for {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Fetches single pages over HTTP
pub struct PageFetcher {
    client: reqwest::Client,
    fetch_delay: Duration,
}

impl PageFetcher {
    /// Builds a fetcher from crawler configuration
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            fetch_delay: Duration::from_millis(config.fetch_delay_ms),
        })
    }

    /// Fetches one page and returns its raw markup
    ///
    /// Non-2xx responses and transport failures are errors. After a
    /// successful fetch the configured delay elapses before this returns.
    pub async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        tracing::debug!("Fetching {}", url);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        tracing::debug!("Fetched {} ({} bytes)", url, body.len());

        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        Ok(body)
    }
}
