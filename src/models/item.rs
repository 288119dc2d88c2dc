use serde::{Deserialize, Serialize};

/// Placeholder for any item attribute that could not be determined.
pub const UNKNOWN: &str = "Unknown";

/// Structured description of the item shown in the primary artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemDescription {
    pub name: String,
    pub series: String,
    pub year: String,
    pub condition: String,
}

impl ItemDescription {
    /// Description used when no identification model is configured.
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            series: UNKNOWN.to_string(),
            year: UNKNOWN.to_string(),
            condition: UNKNOWN.to_string(),
        }
    }
}

/// One market listing used as pricing evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comparable {
    pub title: String,
    pub price: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Suggested resale price range derived from comparables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceEstimate {
    pub min: f64,
    pub max: f64,
    pub suggested: f64,
    pub currency: String,
    /// 0-100
    pub confidence: u8,
}

/// Result payload attached to a completed job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    pub item: ItemDescription,
    pub price_estimate: PriceEstimate,
    pub comparables: Vec<Comparable>,
}
