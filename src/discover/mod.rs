// src/discover/mod.rs
//! Document discovery: fetch a listing page, date each qualifying link and
//! pick the most recent one.

pub mod date;
pub mod fetch;
pub mod listing;

use chrono::NaiveDate;
use metrics::counter;
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;

use crate::error::FetchError;
use date::DateOrigin;
use fetch::{HttpListingFetcher, ListingFetcher, DEFAULT_USER_AGENT};
use listing::{collect_candidates, DEFAULT_LINK_MARKER};

/// How many ranked candidates are logged per listing.
const RANKING_LOG_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub document_url: String,
    pub resolved_date: NaiveDate,
    pub date_origin: DateOrigin,
}

/// Newest first. The sort is stable, so equal dates keep page order.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.resolved_date.cmp(&a.resolved_date));
    candidates
}

pub struct Resolver {
    fetcher: Box<dyn ListingFetcher>,
    marker: String,
}

impl Resolver {
    pub fn new(fetcher: Box<dyn ListingFetcher>) -> Self {
        Self {
            fetcher,
            marker: DEFAULT_LINK_MARKER.to_string(),
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Fetch and rank all dated candidates of a listing page.
    pub async fn candidates(&self, listing_url: &str) -> Result<Vec<Candidate>, FetchError> {
        let base =
            Url::parse(listing_url).map_err(|_| FetchError::InvalidUrl(listing_url.to_string()))?;
        let html = self.fetcher.fetch(listing_url).await?;
        Ok(rank(collect_candidates(&html, &base, &self.marker)))
    }

    /// URL of the most recent document on the listing page, if any.
    /// Fetch failures are logged and reported as `None`.
    pub async fn resolve_latest(&self, listing_url: &str) -> Option<String> {
        tracing::info!(target: "discover", listing = listing_url, "fetching listing page");
        let ranked = match self.candidates(listing_url).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(target: "discover", listing = listing_url, error = %e, "listing fetch failed");
                counter!("price_monitor_fetch_errors_total").increment(1);
                return None;
            }
        };

        if ranked.is_empty() {
            tracing::warn!(target: "discover", listing = listing_url, "no dated document links found");
            return None;
        }

        for (i, c) in ranked.iter().take(RANKING_LOG_LIMIT).enumerate() {
            tracing::info!(
                target: "discover",
                rank = i + 1,
                date = %c.resolved_date,
                origin = ?c.date_origin,
                url = %c.document_url,
                "candidate"
            );
        }

        ranked.into_iter().next().map(|c| c.document_url)
    }
}

/// One-shot HTTP resolution with the default marker and user agent.
pub async fn resolve_latest(listing_url: &str, fetch_timeout: Duration) -> Option<String> {
    let fetcher = match HttpListingFetcher::new(fetch_timeout, DEFAULT_USER_AGENT) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!(target: "discover", error = %e, "http client unavailable");
            return None;
        }
    };
    Resolver::new(Box::new(fetcher))
        .resolve_latest(listing_url)
        .await
}
