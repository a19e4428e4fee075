// src/source/http.rs
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;

use super::{parse_feed, FeedSource, SourceFeed};
use crate::error::FetchError;

pub const USER_AGENT: &str = concat!("feedfilter/", env!("CARGO_PKG_VERSION"));

/// Fetches feeds over HTTP(S) with reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpFeedSource {
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<SourceFeed, FetchError> {
        let failed = |e: reqwest::Error| {
            tracing::warn!(error = ?e, url, provider = "http", "feed http error");
            counter!("feed_fetch_errors_total").increment(1);
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout,
                }
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(timeout)
            .send()
            .await
            .map_err(failed)?;

        let status = resp.status();
        if !status.is_success() {
            counter!("feed_fetch_errors_total").increment(1);
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(failed)?;
        tracing::debug!(target: "source", url, bytes = body.len(), "fetched feed body");

        parse_feed(&body).map_err(|source| FetchError::Parse {
            url: url.to_string(),
            source,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
