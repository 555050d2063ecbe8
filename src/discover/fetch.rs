// src/discover/fetch.rs
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{ConfigError, FetchError};

/// Some authority sites reject reqwest's default identity.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) price-monitor/0.1 (+weekly price update scraper)";

#[async_trait]
pub trait ListingFetcher: Send + Sync {
    /// Return the HTML body of `url`. Any failure is a `FetchError`.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Shared client builder: bounded timeout + explicit user agent.
pub fn build_client(timeout: Duration, user_agent: &str) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

#[derive(Clone)]
pub struct HttpListingFetcher {
    client: Client,
}

impl HttpListingFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_client(timeout, user_agent)?,
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ListingFetcher for HttpListingFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let resp = resp
            .error_for_status()
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        resp.text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }
}

/// In-memory pages keyed by URL. Used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct StaticListingFetcher {
    pages: HashMap<String, String>,
}

impl StaticListingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl ListingFetcher for StaticListingFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NoFixture(url.to_string()))
    }
}
