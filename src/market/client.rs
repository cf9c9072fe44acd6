use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, Response};

use super::listing::ListingPayload;
use super::provider::{ApiResponse, ItemsResponse, MarketError, MarketItem, MarketplaceApi};
use crate::config::MarketConfig;

/// Marketplace client over HTTPS with bearer-token auth.
/// One instance (and its connection pool) is shared by every item of a batch.
pub struct HttpMarketplace {
    client: Client,
    base_url: String,
    token: String,
    user_id: String,
}

impl HttpMarketplace {
    pub fn new(config: &MarketConfig) -> Result<Self, MarketError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            user_id: config.user_id.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
    }

    async fn read(response: Response) -> Result<ApiResponse, MarketError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl MarketplaceApi for HttpMarketplace {
    async fn create_listing(&self, payload: &ListingPayload) -> Result<ApiResponse, MarketError> {
        let response = self
            .request(Method::POST, "/item/fast-sell")
            .json(payload)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn remove_listing(
        &self,
        item_id: u64,
        reason: &str,
    ) -> Result<ApiResponse, MarketError> {
        let response = self
            .request(Method::DELETE, &item_id.to_string())
            .json(&serde_json::json!({ "reason": reason }))
            .send()
            .await?;
        Self::read(response).await
    }

    async fn list_items(&self, category_id: u32) -> Result<Vec<MarketItem>, MarketError> {
        let category = category_id.to_string();
        let response = self
            .request(Method::GET, "/user/items")
            .query(&[("user_id", self.user_id.as_str()), ("category_id", category.as_str())])
            .send()
            .await?;

        let ApiResponse { status, body } = Self::read(response).await?;
        if !(200..300).contains(&status) {
            return Err(MarketError::Status { status, body });
        }

        let parsed: ItemsResponse = serde_json::from_str(&body)?;
        tracing::debug!("Fetched {} listings in category {}", parsed.items.len(), category_id);
        Ok(parsed.items)
    }
}
