//! Upstream byte fetching.

use crate::host::validate_url;
use crate::{Error, Result, ServiceConfig};
use async_trait::async_trait;
use log::debug;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use url::Url;

const MAX_REDIRECTS: usize = 10;

/// Source of raw bytes for an already-validated target URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the full body. Fails with [`Error::FetchFailed`] on network
    /// errors, non-2xx statuses, or bodies larger than the configured limit.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>>;
}

/// `reqwest`-backed fetcher used in production.
pub struct HttpFetcher {
    client: Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        // Each redirect hop goes through the same host check as the requested target.
        let policy = Policy::custom(|attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                return attempt.error(Error::FetchFailed("too many redirects".into()));
            }
            match validate_url(attempt.url()) {
                Ok(()) => attempt.follow(),
                Err(e) => attempt.error(e),
            }
        });

        let client = Client::builder()
            .timeout(Duration::from_millis(config.fetch_timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(policy)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, max_bytes: config.max_fetch_bytes })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        debug!("fetching {}", url);
        let mut res = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::FetchFailed(format!("HTTP GET failed: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            return Err(Error::FetchFailed(format!("upstream returned {}", status)));
        }

        if let Some(len) = res.content_length() {
            if len > self.max_bytes as u64 {
                return Err(Error::FetchFailed(format!(
                    "body of {} bytes exceeds limit of {}",
                    len, self.max_bytes
                )));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = res
            .chunk()
            .await
            .map_err(|e| Error::FetchFailed(format!("Failed to read response body: {}", e)))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(Error::FetchFailed(format!("body exceeds limit of {} bytes", self.max_bytes)));
            }
            body.extend_from_slice(&chunk);
        }
        debug!("fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
