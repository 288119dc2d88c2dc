//! Providers wired in when credentials are absent.
//!
//! They never fail: identification reports an unknown item and the market
//! search is empty, so pricing degrades to the fallback estimate.

use async_trait::async_trait;

use super::{IdentificationProvider, Listing, MarketLookupProvider, ProviderError};
use crate::models::item::ItemDescription;

pub struct OfflineIdentifier;

#[async_trait]
impl IdentificationProvider for OfflineIdentifier {
    async fn identify(&self, _image: &[u8]) -> Result<ItemDescription, ProviderError> {
        Ok(ItemDescription::unknown())
    }

    fn mode(&self) -> &'static str {
        "offline"
    }
}

pub struct OfflineMarket;

#[async_trait]
impl MarketLookupProvider for OfflineMarket {
    async fn search(&self, _query: &str) -> Result<Vec<Listing>, ProviderError> {
        Ok(Vec::new())
    }

    fn mode(&self) -> &'static str {
        "offline"
    }
}
