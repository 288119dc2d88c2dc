//! External collaborators called by the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::item::{Comparable, ItemDescription};
use crate::services::pricing;

pub mod ark;
pub mod offline;
pub mod serpapi;

/// Comparables retained per job.
pub const MAX_COMPARABLES: usize = 5;

/// Source label attached to search-derived comparables.
pub const SEARCH_SOURCE: &str = "Google Search";

/// Identifies the item shown in an image.
#[async_trait]
pub trait IdentificationProvider: Send + Sync {
    async fn identify(&self, image: &[u8]) -> Result<ItemDescription, ProviderError>;

    /// `"live"` or `"offline"`, reported by `/health`.
    fn mode(&self) -> &'static str {
        "live"
    }
}

/// Searches the market for comparable listings.
#[async_trait]
pub trait MarketLookupProvider: Send + Sync {
    /// Raw listings in provider rank order. May be empty.
    async fn search(&self, query: &str) -> Result<Vec<Listing>, ProviderError>;

    fn mode(&self) -> &'static str {
        "live"
    }
}

/// Raw search result before price extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

/// Convert ranked listings into at most [`MAX_COMPARABLES`] comparables.
pub fn to_comparables(listings: Vec<Listing>) -> Vec<Comparable> {
    listings
        .into_iter()
        .take(MAX_COMPARABLES)
        .map(|listing| {
            let price = pricing::find_price_text(&listing.title)
                .or_else(|| listing.snippet.as_deref().and_then(pricing::find_price_text))
                .unwrap_or_else(|| pricing::PRICE_UNAVAILABLE.to_string());
            Comparable {
                title: listing.title,
                price,
                source: SEARCH_SOURCE.to_string(),
                url: listing.link,
            }
        })
        .collect()
}

/// Error for a non-success response. The body is kept for the job's error
/// message; if it cannot be read, the read failure is recorded instead.
pub(crate) async fn status_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read response body: {}>", e));
    ProviderError::Status { status, body }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),
}
