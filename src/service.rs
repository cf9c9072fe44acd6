use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::batch::executor::{BatchExecutor, BatchRequest, RemoteOperation};
use crate::batch::types::WorkItem;
use crate::config::BatchConfig;
use crate::inventory::Inventory;
use crate::market::listing::{DurationClass, ListingTemplate};
use crate::market::operations::{CreateListing, RemoveListing};
use crate::market::provider::MarketplaceApi;
use crate::report::BatchReport;

/// Runs listing uploads and removals through the batch executor
/// against one marketplace account.
pub struct ListingService {
    api: Arc<dyn MarketplaceApi>,
    executor: BatchExecutor,
    template: ListingTemplate,
    batching: BatchConfig,
}

impl ListingService {
    pub fn new(
        api: Arc<dyn MarketplaceApi>,
        executor: BatchExecutor,
        template: ListingTemplate,
        batching: BatchConfig,
    ) -> Self {
        Self {
            api,
            executor,
            template,
            batching,
        }
    }

    pub fn template(&self) -> &ListingTemplate {
        &self.template
    }

    /// Create one listing per login. `template` overrides the configured one
    /// for this call only (currency or origin picked by the caller).
    pub async fn upload(
        &self,
        items: Vec<WorkItem>,
        price: u64,
        duration: DurationClass,
        batch_size: Option<usize>,
        template: Option<ListingTemplate>,
    ) -> BatchReport {
        let template = template.unwrap_or_else(|| self.template.clone());
        tracing::info!(
            "Uploading {} listings ({}, price {} {})",
            items.len(),
            duration,
            price,
            template.currency
        );
        let operation = CreateListing::new(self.api.clone(), template, price, duration);
        let request = BatchRequest {
            items,
            batch_size: batch_size.unwrap_or(self.batching.upload_batch_size),
            inter_batch_delay: self.batching.upload_delay,
        };
        self.run(request, &operation).await
    }

    /// Remove listings by id with the configured removal reason.
    pub async fn remove(&self, items: Vec<WorkItem>, batch_size: Option<usize>) -> BatchReport {
        tracing::info!("Removing {} listings", items.len());
        let operation = RemoveListing::new(self.api.clone(), self.template.removal_reason.clone());
        let request = BatchRequest {
            items,
            batch_size: batch_size.unwrap_or(self.batching.remove_batch_size),
            inter_batch_delay: self.batching.remove_delay,
        };
        self.run(request, &operation).await
    }

    pub async fn inventory(&self) -> Result<Inventory> {
        let items = self
            .api
            .list_items(self.template.category_id)
            .await
            .context("Failed to fetch listings")?;
        Ok(Inventory::from_items(items))
    }

    async fn run(&self, request: BatchRequest, operation: &dyn RemoteOperation) -> BatchReport {
        let items = request.items.clone();
        let started = Instant::now();
        let results = self.executor.run_batch(request, operation).await;
        let report = BatchReport::new(items, results, started.elapsed());

        tracing::info!(
            "{} finished in {:.2?}: {} ok, {} failed, {} skipped",
            operation.name(),
            report.elapsed,
            report.success_count(),
            report.failure_count(),
            report.skipped_count()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::retry::RetryPolicy;
    use crate::config::MarketConfig;
    use crate::market::client::HttpMarketplace;
    use std::time::Duration;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> ListingService {
        let config = MarketConfig {
            base_url: server.uri(),
            listing_url: "https://lzt.market".to_string(),
            token: "secret".to_string(),
            user_id: "42".to_string(),
            timeout: Duration::from_secs(5),
        };
        let api = Arc::new(HttpMarketplace::new(&config).unwrap());
        let executor = BatchExecutor::new(RetryPolicy {
            max_attempts: 2,
            backoff_cap: Duration::ZERO,
            retry_server_errors: false,
        });
        let batching = BatchConfig {
            upload_batch_size: 2,
            upload_delay: Duration::ZERO,
            remove_batch_size: 2,
            remove_delay: Duration::ZERO,
        };
        ListingService::new(api, executor, ListingTemplate::default(), batching)
    }

    #[tokio::test]
    async fn test_upload_reports_every_item() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/item/fast-sell"))
            .and(body_partial_json(serde_json::json!({"login": "bad"})))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"errors": {"price": ["too low"]}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/item/fast-sell"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"item": {"item_id": 9}})),
            )
            .mount(&server)
            .await;

        let service = service(&server);
        let items = WorkItem::numbered(["a", "bad", "c"]);
        let report = service
            .upload(items, 100, DurationClass::Medium, None, None)
            .await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failed_items(), vec![WorkItem::new(2, "bad")]);
        assert_eq!(report.upload_failure_lines(), vec!["Item 2 (bad) - too low"]);
    }

    #[tokio::test]
    async fn test_upload_with_overridden_currency() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/item/fast-sell"))
            .and(body_partial_json(serde_json::json!({"currency": "usd"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let service = service(&server);
        let template = service.template().clone().with_currency("USD").unwrap();
        let report = service
            .upload(WorkItem::numbered(["a"]), 5, DurationClass::Short, Some(1), Some(template))
            .await;
        assert_eq!(report.success_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_sends_configured_reason() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(body_json(serde_json::json!({"reason": "Выдача в телеграм"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(3)
            .mount(&server)
            .await;

        let report = service(&server)
            .remove(WorkItem::numbered(["1", "2", "3"]), None)
            .await;
        assert_eq!(report.success_count(), 3);
        assert_eq!(
            report.removed_listing_lines("https://lzt.market")[2],
            "https://lzt.market/3/"
        );
    }

    #[tokio::test]
    async fn test_remove_never_sends_path_like_ids() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/user/items"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let report = service(&server)
            .remove(WorkItem::numbered(["123/../user/items"]), None)
            .await;
        assert_eq!(report.success_count(), 0);
        assert!(report.removed_listing_lines("https://lzt.market").is_empty());
        assert_eq!(report.failure_count(), 1);
    }

    #[tokio::test]
    async fn test_inventory() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"item_id": 1, "login": "a", "gifts_duration": 90},
                    {"item_id": 2, "login": "b", "gifts_duration": 360}
                ]
            })))
            .mount(&server)
            .await;

        let inventory = service(&server).inventory().await.unwrap();
        assert_eq!(inventory.total(), 2);
        assert_eq!(inventory.count(DurationClass::Long), 1);
    }
}
