use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::listing::ListingPayload;

/// Errors raised by a marketplace client before a response can be classified.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for MarketError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MarketError::Timeout
        } else {
            MarketError::Transport(err.to_string())
        }
    }
}

/// Status and raw body of a response, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

/// One of the caller's own listings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MarketItem {
    pub item_id: u64,
    #[serde(default)]
    pub login: Option<String>,
    /// Subscription length in days
    #[serde(default)]
    pub gifts_duration: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemsResponse {
    #[serde(default)]
    pub items: Vec<MarketItem>,
}

/// Operations the marketplace exposes to a seller account.
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// `POST /item/fast-sell`. Any HTTP status is returned as `Ok`.
    async fn create_listing(&self, payload: &ListingPayload) -> Result<ApiResponse, MarketError>;

    /// `DELETE /{item_id}`. Any HTTP status is returned as `Ok`.
    async fn remove_listing(&self, item_id: u64, reason: &str) -> Result<ApiResponse, MarketError>;

    /// `GET /user/items` for the configured seller, filtered by category.
    async fn list_items(&self, category_id: u32) -> Result<Vec<MarketItem>, MarketError>;
}
