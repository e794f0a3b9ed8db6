use crate::errors::{UpdateError, UpdateResult};
use crate::version_source::VersionInfo;
use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use std::sync::Arc;
use std::time::Duration;

/// Anything that can tell the detector which version is deployed.
#[async_trait]
pub trait VersionFetcher: Send + Sync {
    async fn fetch(&self) -> UpdateResult<VersionInfo>;
}

#[async_trait]
impl<T: VersionFetcher + ?Sized> VersionFetcher for Arc<T> {
    async fn fetch(&self) -> UpdateResult<VersionInfo> {
        (**self).fetch().await
    }
}

/// Queries `GET /api/version` on a running server.
#[derive(Debug, Clone)]
pub struct HttpVersionFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpVersionFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> UpdateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpdateError::network("building HTTP client", e))?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl VersionFetcher for HttpVersionFetcher {
    async fn fetch(&self) -> UpdateResult<VersionInfo> {
        let response = self
            .client
            .get(&self.url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| UpdateError::network(format!("GET {}", self.url), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::unexpected_status(&self.url, status.as_u16()));
        }

        response
            .json::<VersionInfo>()
            .await
            .map_err(|e| UpdateError::network(format!("decoding {}", self.url), e))
    }
}
