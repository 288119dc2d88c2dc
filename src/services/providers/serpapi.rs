use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{Listing, MarketLookupProvider, ProviderError};

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// Google organic search through SerpAPI.
pub struct SerpApiClient {
    http: Client,
    api_key: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

impl SerpApiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.to_string(),
        }
    }
}

/// Map a SerpAPI JSON body to ranked listings.
pub fn parse_search_response(body: &str) -> Result<Vec<Listing>, ProviderError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    if let Some(error) = response.error {
        // "no results" is reported as an error field by SerpAPI
        if error.contains("hasn't returned any results") {
            return Ok(Vec::new());
        }
        return Err(ProviderError::Parse(error));
    }

    Ok(response
        .organic_results
        .into_iter()
        .filter(|r| !r.title.trim().is_empty())
        .map(|r| Listing {
            title: r.title,
            link: r.link,
            snippet: r.snippet,
        })
        .collect())
}

#[async_trait]
impl MarketLookupProvider for SerpApiClient {
    async fn search(&self, query: &str) -> Result<Vec<Listing>, ProviderError> {
        let response = self
            .http
            .get(SERPAPI_URL)
            .query(&[("engine", "google"), ("q", query), ("api_key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::status_error(response).await);
        }
        let body = response.text().await?;

        let listings = parse_search_response(&body)?;
        tracing::debug!(query = %query, results = listings.len(), "Market search complete");
        Ok(listings)
    }
}
